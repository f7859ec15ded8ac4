//! Account settings and session actions.

use axum::extract::State;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use markbox_core::{Error, Result, UserSettingsPatch};

use super::{ActionResult, RequireOwner};
use crate::error::ApiError;
use crate::form::FormData;
use crate::middleware::Session;
use crate::AppState;

static THEME_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]{1,64}$").expect("theme pattern is valid"));

fn validate_theme(theme: &str) -> Result<()> {
    if THEME_NAME.is_match(theme) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("Invalid theme: {}", theme)))
    }
}

async fn save_theme(state: &AppState, owner_id: i64, form: &FormData) -> Result<()> {
    let theme = form.required("theme")?;
    let theme = theme.trim();
    validate_theme(theme)?;
    state
        .users
        .update_settings(
            owner_id,
            UserSettingsPatch {
                theme: Some(theme.to_string()),
            },
        )
        .await?;
    Ok(())
}

/// POST /actions/change-theme
///
/// Any failure answers `{success: false}` without a message.
pub async fn change_theme(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
    form: std::result::Result<FormData, ApiError>,
) -> ActionResult {
    let Ok(form) = form else {
        return ActionResult::bare_failure();
    };
    match save_theme(&state, owner_id, &form).await {
        Ok(()) => ActionResult::ok(),
        Err(e) => {
            warn!(
                subsystem = "api",
                component = "actions",
                op = "change_theme",
                owner_id,
                error = %e,
                "Failed to change theme"
            );
            ActionResult::bare_failure()
        }
    }
}

/// POST /actions/logout
pub async fn logout(session: Session) -> ActionResult {
    session.clear().await;
    ActionResult::ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_names() {
        assert!(validate_theme("dark").is_ok());
        assert!(validate_theme("solarized-light").is_ok());
        assert!(validate_theme("").is_err());
        assert!(validate_theme("Dark").is_err());
        assert!(validate_theme("a b").is_err());
        assert!(validate_theme(&"a".repeat(65)).is_err());
    }
}
