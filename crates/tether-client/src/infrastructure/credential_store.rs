//! Locating and reading credentials on disk.
//!
//! Every failure here is soft: a missing or unreadable credential means the
//! connection is attempted without one, and the server decides.

use std::path::{Path, PathBuf};

use tether_core::{Cookie, XauthEntry};
use tracing::{debug, warn};

/// Authority file to read: the configured path, `XAUTHORITY`, or
/// `~/.Xauthority`.
pub fn xauthority_path(
    configured: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Option<PathBuf> {
    configured
        .map(Path::to_path_buf)
        .or_else(|| env("XAUTHORITY").map(PathBuf::from))
        .or_else(|| env("HOME").map(|h| Path::new(&h).join(".Xauthority")))
}

/// Name of this machine as authority records spell it.
pub fn local_hostname() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            debug!(error = %e, "host name unavailable");
            String::new()
        }
    }
}

/// Finds the credential for `display` in the authority file at `path`.
pub fn load_display_credential(path: &Path, display: u32, hostname: &str) -> Option<XauthEntry> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no authority file");
            return None;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "authority file unreadable");
            return None;
        }
    };
    let entries = match XauthEntry::parse_all(&bytes) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "authority file malformed");
            return None;
        }
    };
    tether_core::auth::find_entry(&entries, &display.to_string(), hostname).cloned()
}

/// Cookie files to try, in order.
pub fn cookie_paths(
    configured: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(4);
    if let Some(p) = configured {
        paths.push(p.to_path_buf());
    }
    if let Some(p) = env("PULSE_COOKIE") {
        paths.push(PathBuf::from(p));
    }
    if let Some(home) = env("HOME") {
        let home = Path::new(&home);
        paths.push(home.join(".config").join("pulse").join("cookie"));
        paths.push(home.join(".pulse-cookie"));
    }
    paths
}

/// Reads the first usable cookie among `paths`, or the anonymous cookie.
pub fn load_cookie(paths: &[PathBuf]) -> Cookie {
    for path in paths {
        match std::fs::read(path) {
            Ok(bytes) => match Cookie::from_bytes(&bytes) {
                Ok(cookie) => {
                    debug!(path = %path.display(), "using audio cookie");
                    return cookie;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "ignoring cookie file"),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "cookie file unreadable"),
        }
    }
    debug!("no audio cookie found, authenticating anonymously");
    Cookie::anonymous()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::auth::{FAMILY_LOCAL, FAMILY_WILD, MIT_MAGIC_COOKIE};

    fn entry(family: u16, number: &str, secret: u8) -> XauthEntry {
        XauthEntry {
            family,
            address: b"box".to_vec(),
            number: number.to_string(),
            name: MIT_MAGIC_COOKIE.to_string(),
            data: vec![secret; 16],
        }
    }

    #[test]
    fn test_xauthority_path_precedence() {
        let env_with = |k: &str| match k {
            "XAUTHORITY" => Some("/run/xauth".to_string()),
            "HOME" => Some("/home/u".to_string()),
            _ => None,
        };
        let home_only = |k: &str| (k == "HOME").then(|| "/home/u".to_string());

        assert_eq!(
            xauthority_path(Some(Path::new("/etc/x")), env_with),
            Some(PathBuf::from("/etc/x"))
        );
        assert_eq!(xauthority_path(None, env_with), Some(PathBuf::from("/run/xauth")));
        assert_eq!(
            xauthority_path(None, home_only),
            Some(PathBuf::from("/home/u/.Xauthority"))
        );
        assert_eq!(xauthority_path(None, |_| None), None);
    }

    #[test]
    fn test_load_display_credential_picks_display() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Xauthority");
        let file: Vec<u8> = [entry(FAMILY_LOCAL, "0", 1), entry(FAMILY_WILD, "7", 7)]
            .iter()
            .flat_map(XauthEntry::encode)
            .collect();
        std::fs::write(&path, file).unwrap();

        // Act
        let seven = load_display_credential(&path, 7, "box");
        let three = load_display_credential(&path, 3, "box");

        // Assert
        assert_eq!(seven.map(|e| e.data), Some(vec![7; 16]));
        assert!(three.is_none());
    }

    #[test]
    fn test_missing_or_garbled_authority_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_display_credential(&dir.path().join("absent"), 0, "box").is_none());
        let bad = dir.path().join("bad");
        std::fs::write(&bad, [0x01, 0x00, 0x00]).unwrap();
        assert!(load_display_credential(&bad, 0, "box").is_none());
    }

    #[test]
    fn test_cookie_search_order_and_fallback() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let short = dir.path().join("short");
        let good = dir.path().join("good");
        std::fs::write(&short, [1u8; 10]).unwrap();
        std::fs::write(&good, [9u8; 256]).unwrap();

        // Act
        let found = load_cookie(&[dir.path().join("absent"), short.clone(), good]);
        let fallback = load_cookie(&[short]);

        // Assert
        assert_eq!(found.as_bytes(), &[9u8; 256]);
        assert!(fallback.is_anonymous());
    }

    #[test]
    fn test_cookie_paths_order() {
        let env = |k: &str| match k {
            "PULSE_COOKIE" => Some("/tmp/c".to_string()),
            "HOME" => Some("/home/u".to_string()),
            _ => None,
        };
        assert_eq!(
            cookie_paths(Some(Path::new("/etc/c")), env),
            vec![
                PathBuf::from("/etc/c"),
                PathBuf::from("/tmp/c"),
                PathBuf::from("/home/u/.config/pulse/cookie"),
                PathBuf::from("/home/u/.pulse-cookie"),
            ]
        );
    }
}
