//! Credential encoding for cookie-authenticated firmware
//!
//! Several firmware generations expect an `Authorization` *cookie* holding a
//! Basic-auth style value instead of the real header.

use base64::Engine;

/// Cookie name carrying the pseudo Basic-auth value
pub const AUTH_COOKIE: &str = "Authorization";

/// The Archer C7 login page only hashes this many bytes of the password
const C7_PASSWORD_LIMIT: usize = 15;

/// Base64 of `username:password`
pub fn encode_basic(username: &str, password: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, password))
}

/// Cookie value: `Basic <base64(username:password)>`
pub fn basic_cookie_value(username: &str, password: &str) -> String {
    format!("Basic {}", encode_basic(username, password))
}

/// Full cookie string as sent in the `Cookie` header
pub fn basic_cookie_string(username: &str, password: &str) -> String {
    format!("{}={}", AUTH_COOKIE, basic_cookie_value(username, password))
}

/// Lowercase hex MD5 over at most the first 15 raw bytes of the password
pub fn truncated_md5(password: &str) -> String {
    let bytes = password.as_bytes();
    let end = bytes.len().min(C7_PASSWORD_LIMIT);
    format!("{:x}", md5::compute(&bytes[..end]))
}

/// Uppercase hex MD5 over the full password (EAP access points)
pub fn uppercase_md5(password: &str) -> String {
    format!("{:x}", md5::compute(password.as_bytes())).to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_cookie_string() {
        assert_eq!(
            basic_cookie_string("admin", "admin"),
            "Authorization=Basic YWRtaW46YWRtaW4="
        );
        assert_eq!(
            basic_cookie_string("admin", "admin"),
            basic_cookie_string("admin", "admin")
        );
    }

    #[test]
    fn test_basic_cookie_decodes_to_credentials() {
        let value = basic_cookie_value("user", "p@ss:word");
        let payload = value.strip_prefix("Basic ").unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "user:p@ss:word");
    }

    #[test]
    fn test_truncated_md5_known_value() {
        // md5("admin")
        assert_eq!(truncated_md5("admin"), "21232f297a57a5a743894a0e4a801fc3");
    }

    #[test]
    fn test_truncated_md5_ignores_bytes_after_15() {
        let prefix = "abcdefghijklmno";
        assert_eq!(prefix.len(), 15);
        assert_eq!(truncated_md5("abcdefghijklmnopqrstuvwxyz"), truncated_md5(prefix));
        assert_ne!(truncated_md5("abcdefghijklmn"), truncated_md5(prefix));
    }

    #[test]
    fn test_truncated_md5_counts_raw_bytes() {
        // 7 two-byte characters + 1 = 15 bytes, the trailing 'x' is dropped
        let password = "ééééééé1x";
        assert_eq!(truncated_md5(password), format!("{:x}", md5::compute(&password.as_bytes()[..15])));
    }

    #[test]
    fn test_uppercase_md5() {
        assert_eq!(uppercase_md5("admin"), "21232F297A57A5A743894A0E4A801FC3");
    }
}
