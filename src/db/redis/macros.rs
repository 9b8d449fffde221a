/// Serves a value from the cache, computing and storing it on a miss.
///
/// Cache read failures are logged and treated as misses, so `$block` always
/// yields a value even when Redis is down. `$block` must be a future whose
/// output is the value itself, not a `Result`.
///
/// # Arguments
/// * `$cache`: a [`Cache`](crate::db::Cache)
/// * `$key`: the [`CacheKey`](crate::db::CacheKey) to read and write
/// * `$ttl`: time-to-live of the stored value in seconds
/// * `$block`: future computing the value on a miss
///
/// # Example
/// ```rust,ignore
/// let job_ids = cached!(cache, key, 60, recommender.recommend(applier_id, 10, 0.5));
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let hit = match $cache.get_from_cache(&$key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, key = %$key, "Cache read failed, computing fresh value");
                None
            }
        };

        match hit {
            Some(cached) => {
                tracing::debug!(key = %$key, "Cache hit");
                cached
            }
            None => {
                let value = $block.await;
                $cache.set_in_background(&$key, &value, $ttl);
                value
            }
        }
    }};
}
