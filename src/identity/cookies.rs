//! Cookie 存储 (Cookie Store)
//!
//! 按名称覆盖合并；以 Netscape `cookies.txt` 格式持久化，兼容浏览器导出约定。

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::core::error::Result;
use crate::utils::save_file;

const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File";
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// 单个 Cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// 过期时间 (Unix 秒)；`None` 为会话 Cookie
    pub expires: Option<u64>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: "/".to_string(),
            secure: false,
            http_only: false,
            expires: None,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// 是否已过期（会话 Cookie 永不过期）
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires.is_some_and(|exp| exp <= now)
    }

    /// 解析 `Set-Cookie` 响应头
    ///
    /// `Max-Age` 优先于 `Expires`；过去的时间统一记为 0，合并时即被删除。
    /// 带 `Domain` 属性的 Cookie 对子域生效，按 Netscape 约定存为 `.domain`。
    pub fn parse_set_cookie(header: &str, default_domain: &str) -> Option<Self> {
        let parsed = cookie::Cookie::parse(header)
            .map_err(|e| debug!("忽略无法解析的 Set-Cookie: {}", e))
            .ok()?;

        let expires = match (parsed.max_age(), parsed.expires_datetime()) {
            (Some(age), _) => Some(match u64::try_from(age.whole_seconds()) {
                Ok(secs) if secs > 0 => unix_now().saturating_add(secs),
                _ => 0,
            }),
            (None, Some(at)) => Some(u64::try_from(at.unix_timestamp()).unwrap_or(0)),
            (None, None) => None,
        };

        Some(Self {
            name: parsed.name().to_string(),
            value: parsed.value().to_string(),
            domain: match parsed.domain() {
                Some(d) => format!(".{}", d),
                None => default_domain.to_string(),
            },
            path: parsed.path().unwrap_or("/").to_string(),
            secure: parsed.secure().unwrap_or(false),
            http_only: parsed.http_only().unwrap_or(false),
            expires,
        })
    }

    /// 解析 Netscape 格式的一行
    fn from_netscape_line(line: &str) -> Option<Self> {
        let (line, http_only) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
            Some(rest) => (rest, true),
            None => (line, false),
        };

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 7 {
            return None;
        }

        let expires = match fields[4].trim() {
            "" | "0" => None,
            raw => Some(raw.parse::<u64>().ok()?),
        };

        Some(Self {
            domain: fields[0].to_string(),
            path: fields[2].to_string(),
            secure: parse_flag(fields[3])?,
            expires,
            name: fields[5].to_string(),
            value: fields[6].to_string(),
            http_only,
        })
    }

    fn to_netscape_line(&self) -> String {
        let prefix = if self.http_only { HTTP_ONLY_PREFIX } else { "" };
        let include_subdomains = self.domain.starts_with('.');
        format!(
            "{}{}\t{}\t{}\t{}\t{}\t{}\t{}",
            prefix,
            self.domain,
            flag(include_subdomains),
            self.path,
            flag(self.secure),
            self.expires.map(|e| e.to_string()).unwrap_or_default(),
            self.name,
            self.value,
        )
    }
}

fn flag(b: bool) -> &'static str {
    if b { "TRUE" } else { "FALSE" }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s {
        "TRUE" => Some(true),
        "FALSE" => Some(false),
        _ => None,
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Cookie 存储
///
/// 合并为按名称覆盖；除同名替换或显式过期外不会丢弃任何 Cookie。
#[derive(Debug, Default)]
pub struct CookieStore {
    jar: RwLock<IndexMap<String, Cookie>>,
    path: Option<PathBuf>,
}

impl CookieStore {
    /// 纯内存存储，`persist` 为空操作
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// 从持久化文件加载
    ///
    /// 文件缺失或损坏时以空 Cookie 罐启动，仅记录警告。
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let store = Self {
            jar: RwLock::new(IndexMap::new()),
            path: Some(path.clone()),
        };

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Cookie 文件不存在，使用空存储: {}", path.display());
                return store;
            }
            Err(e) => {
                warn!("读取 Cookie 文件失败: {}，使用空存储", e);
                return store;
            }
        };

        let mut skipped = 0usize;
        let cookies: Vec<Cookie> = text
            .lines()
            .filter(|l| {
                let t = l.trim();
                !t.is_empty() && (!t.starts_with('#') || t.starts_with(HTTP_ONLY_PREFIX))
            })
            .filter_map(|l| {
                let parsed = Cookie::from_netscape_line(l);
                if parsed.is_none() {
                    skipped += 1;
                }
                parsed
            })
            .collect();

        if skipped > 0 {
            warn!("Cookie 文件中有 {} 行无法解析，已跳过", skipped);
        }

        // 加载时忽略过期时间，与浏览器导出文件的惯例一致
        {
            let mut jar = store.jar.write();
            for cookie in cookies {
                jar.insert(cookie.name.clone(), cookie);
            }
        }
        info!("已从 {} 加载 {} 个 Cookie", path.display(), store.len());
        store
    }

    /// 当前 Cookie 快照 (name -> value)
    pub fn snapshot(&self) -> IndexMap<String, String> {
        self.jar
            .read()
            .values()
            .map(|c| (c.name.clone(), c.value.clone()))
            .collect()
    }

    /// 合并新 Cookie：同名覆盖，显式过期的删除
    pub fn merge<I>(&self, cookies: I)
    where
        I: IntoIterator<Item = Cookie>,
    {
        let now = unix_now();
        let mut jar = self.jar.write();
        for cookie in cookies {
            if cookie.is_expired(now) {
                jar.shift_remove(&cookie.name);
            } else {
                jar.insert(cookie.name.clone(), cookie);
            }
        }
    }

    /// 写回持久化文件（包含会话 Cookie）
    pub async fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let body = self.render();
        save_file(path, body.as_bytes()).await?;
        debug!("Cookie 已保存至 {}", path.display());
        Ok(())
    }

    fn render(&self) -> String {
        let jar = self.jar.read();
        let mut out = String::from(NETSCAPE_HEADER);
        out.push_str("\n\n");
        for cookie in jar.values() {
            out.push_str(&cookie.to_netscape_line());
            out.push('\n');
        }
        out
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.jar.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
