/// Parser thread pool for the bundled analyzer.
/// Each analysis builds its own pool, so concurrent queries never share one.

use crate::error::AnalyzerError;

/// Half the available cores, minimum 1.
pub fn default_workers() -> usize {
    std::cmp::max(1, num_cpus::get() / 2)
}

pub fn parser_pool(jobs: Option<usize>) -> Result<rayon::ThreadPool, AnalyzerError> {
    let workers = jobs.filter(|&n| n > 0).unwrap_or_else(default_workers);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("provenance-parse-{}", i))
        .build()?;
    log::debug!(
        "parser pool: {} workers (system has {} cores)",
        workers,
        num_cpus::get()
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_pool_honours_jobs() {
        let pool = parser_pool(Some(2)).unwrap();
        assert_eq!(pool.current_num_threads(), 2);
    }

    #[test]
    fn test_zero_jobs_falls_back_to_default() {
        let pool = parser_pool(Some(0)).unwrap();
        assert_eq!(pool.current_num_threads(), default_workers());
    }
}
