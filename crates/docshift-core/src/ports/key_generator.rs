//! KeyGenerator port - job id と保存キーの生成
//!
//! Every key has a fresh random component; the optional base name is only
//! there for humans browsing the bucket. Two jobs for `deck.pptx` therefore
//! never share an output key.
//!
//! # 実装
//! - **UlidKeyGenerator**: ULID ベース（本番用）

use ulid::Ulid;

use crate::domain::ids::JobId;
use crate::ports::Clock;

/// Longest base name kept in a key.
pub const MAX_BASE_NAME_LEN: usize = 64;

/// KeyGenerator はジョブ ID と保存キーを生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数ワーカーから使える）
pub trait KeyGenerator: Send + Sync {
    fn new_job_id(&self) -> JobId;

    /// Key for an uploaded source file, e.g. `01hv8z..._deck.pptx`.
    fn new_input_key(&self, base_name: Option<&str>, extension: &str) -> String;

    /// Key for a converted result, e.g. `01hv8z..._deck.pdf`.
    fn new_output_key(&self, base_name: Option<&str>, extension: &str) -> String;
}

/// UlidKeyGenerator は ULID ベースの生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// The 80 random bits carry the uniqueness guarantee; the timestamp half
/// keeps keys roughly sortable by creation time.
pub struct UlidKeyGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidKeyGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }

    fn key(&self, base_name: Option<&str>, extension: &str) -> String {
        let random = self.next_ulid().to_string().to_lowercase();
        let mut key = match base_name.and_then(sanitize_base_name) {
            Some(base) => format!("{random}_{base}"),
            None => random,
        };
        let extension = sanitize_extension(extension);
        if !extension.is_empty() {
            key.push('.');
            key.push_str(&extension);
        }
        key
    }
}

impl<C: Clock> KeyGenerator for UlidKeyGenerator<C> {
    fn new_job_id(&self) -> JobId {
        JobId::from(self.next_ulid())
    }

    fn new_input_key(&self, base_name: Option<&str>, extension: &str) -> String {
        self.key(base_name, extension)
    }

    fn new_output_key(&self, base_name: Option<&str>, extension: &str) -> String {
        self.key(base_name, extension)
    }
}

/// Reduces a caller-supplied name to `[A-Za-z0-9._-]`.
///
/// Runs of any other character collapse to a single `_`, leading dots and
/// separators are dropped (no hidden files, no `..`), and the result is
/// capped at [`MAX_BASE_NAME_LEN`]. Returns `None` when nothing usable is left.
pub fn sanitize_base_name(name: &str) -> Option<String> {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }

    let trimmed = out.trim_start_matches(['.', '_', '-']);
    let capped: String = trimmed.chars().take(MAX_BASE_NAME_LEN).collect();
    let capped = capped.trim_end_matches(['.', '_', '-']);
    if capped.is_empty() {
        None
    } else {
        Some(capped.to_string())
    }
}

fn sanitize_extension(extension: &str) -> String {
    extension
        .trim_start_matches('.')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}
