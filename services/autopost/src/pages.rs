//! HTML rendering for the callback pages
//!
//! Three pages, all static beyond a few interpolated values: the landing page
//! (shown when the callback is hit with no parameters), the success page, and
//! the error page. Interpolated values are HTML-escaped; the authorization URL
//! is produced by this service so it is safe to render as a link.

const STYLE: &str = "body { font-family: sans-serif; max-width: 600px; margin: 50px auto; padding: 20px; } \
    .info { background-color: #e8f0fe; padding: 15px; border-radius: 5px; margin: 20px 0; } \
    .error { color: #d93025; background-color: #fce8e6; padding: 15px; border-radius: 5px; } \
    .url-box { background-color: #f1f3f4; padding: 10px; border-radius: 5px; margin: 10px 0; font-family: monospace; word-break: break-all; }";

/// Escape a value for interpolation into HTML text content.
fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Landing page: shows this service's callback URL (for registering with the
/// platform) and a freshly generated authorization URL.
pub fn landing_page(callback_url: &str, auth_url: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>X OAuth 2.0 Authorization</title><meta charset="UTF-8"><style>{STYLE}</style></head>
<body>
<h1>X OAuth 2.0 Authorization</h1>
<div class="info">
<p>Callback URL (register this as the redirect URI in the developer portal):</p>
<div class="url-box">{callback}</div>
</div>
<div class="info">
<p>Open this URL to authorize an account:</p>
<div class="url-box"><a href="{auth}">{auth}</a></div>
<p>Authorization uses OAuth 2.0 with PKCE. Granted scopes allow reading and
posting on your behalf, including offline access for token refresh.</p>
</div>
</body>
</html>"#,
        callback = escape(callback_url),
        auth = escape(auth_url),
    )
}

/// Success page rendered after a completed authorization.
pub fn success_page(user_name: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Authorization Complete</title><meta charset="UTF-8"><style>{STYLE}</style></head>
<body>
<h1>Authorization complete</h1>
<div class="info">
<p>@{user} is now authorized. Credentials were saved; scheduled posts will
draw from the content channels.</p>
</div>
<p>You can close this window.</p>
</body>
</html>"#,
        user = escape(user_name),
    )
}

/// Error page: authorization was denied or the flow failed.
pub fn auth_error_page(detail: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Authorization Error</title><meta charset="UTF-8"><style>{STYLE}</style></head>
<body>
<h1>Authorization error</h1>
<div class="error"><p>{detail}</p></div>
<p>Reload the landing page to start a new authorization.</p>
</body>
</html>"#,
        detail = escape(detail),
    )
}
