//! Turning server names into local socket paths.
//!
//! Display names:
//!
//! | Form            | Socket                         |
//! |-----------------|--------------------------------|
//! | `:N`, `:N.S`    | `<socket_dir>/XN`              |
//! | `unix:N[.S]`    | `<socket_dir>/XN`              |
//! | `/abs/path[:N]` | the path itself                |
//!
//! Any other host part names a remote machine, which this client does not
//! reach.
//!
//! Audio servers are tried in order: the configured or `PULSE_SERVER`
//! value (`unix:<path>` or a bare absolute path), else
//! `$XDG_RUNTIME_DIR/pulse/native`, `/run/user/<uid>/pulse/native`, and
//! `/var/run/pulse/native`.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ClientError;

/// A parsed display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayAddress {
    pub socket: PathBuf,
    pub display: u32,
    pub screen: u32,
}

fn unresolvable(address: &str, reason: impl Into<String>) -> ClientError {
    ClientError::AddressResolution {
        address: address.to_string(),
        reason: reason.into(),
    }
}

/// Splits `N` or `N.S` into display and screen numbers.
fn parse_numbers(full: &str, text: &str) -> Result<(u32, u32), ClientError> {
    let (display, screen) = match text.split_once('.') {
        Some((d, s)) => (d, Some(s)),
        None => (text, None),
    };
    let display = display
        .parse()
        .map_err(|_| unresolvable(full, "display number is not a number"))?;
    let screen = match screen {
        Some(s) => s
            .parse()
            .map_err(|_| unresolvable(full, "screen number is not a number"))?,
        None => 0,
    };
    Ok((display, screen))
}

/// Parses a display name into the socket to connect to.
///
/// # Errors
///
/// [`ClientError::AddressResolution`] for empty, malformed, or remote names.
pub fn parse_display_name(name: &str, socket_dir: &Path) -> Result<DisplayAddress, ClientError> {
    if name.is_empty() {
        return Err(unresolvable(name, "display name is empty"));
    }

    if name.starts_with('/') {
        let (socket, display, screen) = match name.rsplit_once(':') {
            Some((path, numbers)) => {
                let (d, s) = parse_numbers(name, numbers)?;
                (PathBuf::from(path), d, s)
            }
            None => (PathBuf::from(name), 0, 0),
        };
        return Ok(DisplayAddress {
            socket,
            display,
            screen,
        });
    }

    let Some((host, numbers)) = name.rsplit_once(':') else {
        return Err(unresolvable(name, "expected HOST:DISPLAY[.SCREEN]"));
    };
    if !host.is_empty() && host != "unix" {
        return Err(unresolvable(
            name,
            format!("remote host {host:?} is not reachable over a local socket"),
        ));
    }
    let (display, screen) = parse_numbers(name, numbers)?;
    Ok(DisplayAddress {
        socket: socket_dir.join(format!("X{display}")),
        display,
        screen,
    })
}

/// The display name to use: the configured one, else `DISPLAY`.
pub fn display_name(
    configured: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String, ClientError> {
    configured
        .map(str::to_string)
        .or_else(|| env("DISPLAY"))
        .filter(|n| !n.is_empty())
        .ok_or_else(|| unresolvable("", "no display configured and DISPLAY is unset"))
}

/// Parses one audio server string into the unix sockets it names.
fn parse_audio_server(spec: &str) -> Result<Vec<PathBuf>, ClientError> {
    let sockets: Vec<PathBuf> = spec
        .split_whitespace()
        .filter_map(|entry| {
            let path = entry.strip_prefix("unix:").unwrap_or(entry);
            if path.starts_with('/') {
                Some(PathBuf::from(path))
            } else {
                debug!(entry, "skipping non-local audio server entry");
                None
            }
        })
        .collect();
    if sockets.is_empty() {
        return Err(unresolvable(spec, "no unix socket among the server entries"));
    }
    Ok(sockets)
}

/// Socket paths to try, in order, for the audio server.
///
/// # Errors
///
/// [`ClientError::AddressResolution`] if an explicit server string names no
/// unix socket.
pub fn audio_socket_candidates(
    configured: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
    uid: u32,
) -> Result<Vec<PathBuf>, ClientError> {
    if let Some(spec) = configured.map(str::to_string).or_else(|| env("PULSE_SERVER")) {
        return parse_audio_server(&spec);
    }
    let mut candidates = Vec::with_capacity(3);
    if let Some(runtime) = env("XDG_RUNTIME_DIR").filter(|d| !d.is_empty()) {
        candidates.push(Path::new(&runtime).join("pulse").join("native"));
    }
    candidates.push(PathBuf::from(format!("/run/user/{uid}/pulse/native")));
    candidates.push(PathBuf::from("/var/run/pulse/native"));
    Ok(candidates)
}

/// Real user id of this process.
pub fn current_uid() -> u32 {
    // SAFETY: getuid has no preconditions and cannot fail.
    unsafe { libc::getuid() }
}

/// Environment lookup backed by the process environment.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
