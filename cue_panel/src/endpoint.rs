use crate::error::PanelError;
use url::Url;

pub const SOCKET_PATH: &str = "/ws";

/// Derives the controller socket url from the url the panel was served from.
///
/// `https` pages talk `wss`, everything else `ws`; host and port are kept and
/// the path is always [`SOCKET_PATH`]. A `ws`/`wss` url is taken as-is.
pub fn socket_url(page: &str) -> Result<Url, PanelError> {
    let page = Url::parse(page.trim())?;
    let scheme = match page.scheme() {
        "ws" | "wss" => return Ok(page),
        "https" => "wss",
        "http" => "ws",
        other => return Err(PanelError::UnsupportedScheme(other.to_string())),
    };

    let host = page
        .host()
        .ok_or_else(|| PanelError::MissingHost(page.to_string()))?;
    let authority = match page.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    Ok(Url::parse(&format!("{scheme}://{authority}{SOCKET_PATH}"))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_page_uses_ws() {
        let url = socket_url("http://192.168.4.1/index.html").unwrap();
        assert_eq!(url.as_str(), "ws://192.168.4.1/ws");
    }

    #[test]
    fn secure_page_uses_wss_and_keeps_port() {
        let url = socket_url("https://cues.local:8443/panel?x=1").unwrap();
        assert_eq!(url.as_str(), "wss://cues.local:8443/ws");
    }

    #[test]
    fn socket_urls_pass_through() {
        let url = socket_url("ws://127.0.0.1:9001/ws").unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:9001/ws");
    }

    #[test]
    fn other_schemes_are_rejected() {
        assert!(matches!(
            socket_url("ftp://example.com/"),
            Err(PanelError::UnsupportedScheme(s)) if s == "ftp"
        ));
        assert!(matches!(socket_url("not a url"), Err(PanelError::Url(_))));
    }
}
