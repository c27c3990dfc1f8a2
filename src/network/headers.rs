//! 请求头模板
//!
//! 各 HTTP 策略共享的静态头集合，首次访问时构建。

use std::sync::OnceLock;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

const NAVIGATION: &[(&str, &str)] = &[
    ("upgrade-insecure-requests", "1"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
];

const CLIENT_HINTS: &[(&str, &str)] = &[
    (
        "sec-ch-ua",
        "\" Not A;Brand\";v=\"99\", \"Chromium\";v=\"96\", \"Google Chrome\";v=\"96\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
];

fn build(pairs: &[&[(&'static str, &'static str)]]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for &(name, value) in pairs.iter().flat_map(|p| p.iter()) {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    headers
}

/// 通用 Chrome 指纹（含 Client Hints）
pub fn chrome() -> &'static HeaderMap {
    static HEADERS: OnceLock<HeaderMap> = OnceLock::new();
    HEADERS.get_or_init(|| {
        build(&[
            &[
                ("accept", ACCEPT_HTML),
                ("accept-language", "en-US,en;q=0.9"),
            ],
            CLIENT_HINTS,
            NAVIGATION,
        ])
    })
}

/// Chrome 96 握手签名对应的头集合
pub fn chrome96() -> &'static HeaderMap {
    static HEADERS: OnceLock<HeaderMap> = OnceLock::new();
    HEADERS.get_or_init(|| {
        build(&[
            &[
                ("accept", ACCEPT_HTML),
                ("accept-language", "en-US,en;q=0.5"),
                ("dnt", "1"),
                ("pragma", "no-cache"),
                ("cache-control", "no-cache"),
            ],
            NAVIGATION,
        ])
    })
}

/// 普通浏览器头
pub fn plain() -> &'static HeaderMap {
    static HEADERS: OnceLock<HeaderMap> = OnceLock::new();
    HEADERS.get_or_init(|| {
        build(&[
            &[
                ("accept", ACCEPT_HTML),
                ("accept-language", "en-US,en;q=0.5"),
                ("cache-control", "max-age=0"),
            ],
            NAVIGATION,
        ])
    })
}

/// 浏览器导航时通过 CDP 追加的头
pub fn browser_extra() -> serde_json::Value {
    let mut map = serde_json::Map::new();
    map.insert("Accept-Language".into(), "en-US,en;q=0.9".into());
    for (name, value) in CLIENT_HINTS.iter().chain(NAVIGATION) {
        map.insert((*name).into(), (*value).into());
    }
    serde_json::Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_carry_navigation_headers() {
        for profile in [chrome(), chrome96(), plain()] {
            assert_eq!(profile["sec-fetch-mode"], "navigate");
            assert!(profile.contains_key("accept"));
        }
        assert!(chrome().contains_key("sec-ch-ua"));
        assert!(!plain().contains_key("sec-ch-ua"));
    }

    #[test]
    fn browser_extra_is_a_flat_object() {
        let extra = browser_extra();
        assert_eq!(extra["sec-ch-ua-mobile"], "?0");
        assert_eq!(extra["Accept-Language"], "en-US,en;q=0.9");
    }
}
