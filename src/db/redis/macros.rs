/// Read-through caching over [`Cache`](crate::db::Cache).
///
/// Returns the cached value for `$key` when present. Otherwise awaits
/// `$block`, queues the result for a background write with `$ttl` seconds to
/// live, and returns it. Both the cache read and `$block` propagate errors
/// with `?`, so the enclosing function must return `AppResult`.
///
/// # Example
/// ```rust,ignore
/// let videos: Vec<Video> = cached!(self.cache, CacheKey::Popular(region.to_string()), 3600, async {
///     self.fetch_popular(region, max_results).await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        if let Some(cached) = $cache.get_from_cache(&$key).await? {
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.set_in_background(&$key, &value, $ttl);
            Ok(value)
        }
    }};
}
