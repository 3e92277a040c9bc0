/// Key under which the forum caches a user's per-session profile
pub fn session_cache_key(user_id: u64, session_id: u64) -> String {
    format!("user:{}:session:{}", user_id, session_id)
}
