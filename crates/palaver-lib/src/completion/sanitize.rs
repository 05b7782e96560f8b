use tracing::error;

use crate::context::ExecutionContext;

/// Make an API error message safe to relay to the caller.
///
/// Remote callers never see a message that contains the API key or mentions
/// an "api key"; they get a pointer to the server administrator instead.
/// Local callers own the key and see the message unchanged.
pub fn sanitize_api_error(message: &str, api_key: &str, ctx: &ExecutionContext) -> String {
    let Some(admin_contact) = ctx.admin_contact() else {
        return message.to_string();
    };

    let leaks_key = !api_key.is_empty() && message.contains(api_key);
    if leaks_key || message.to_lowercase().contains("api key") {
        error!(message = %message, "API key was included in an error message, censoring");
        return format!(
            "[ERROR] Something is wrong with the API key. Please contact the server administrator and let them know: {admin_contact}"
        );
    }
    message.to_string()
}
