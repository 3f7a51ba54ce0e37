use crate::wire::HealthRes;

/// Health service shared by the API surfaces.
///
/// The caller supplies the live figures (document count, configured modes); this type only
/// owns the shape of the answer so every surface reports readiness the same way.
#[derive(Clone)]
pub struct HealthService;

impl HealthService {
    /// Builds a health response.
    ///
    /// The service is always `ok` once it is able to answer. An empty document store is
    /// reported as `degraded` because queries will run without regulatory context.
    ///
    /// # Returns
    /// A `HealthRes` describing readiness and the number of stored chunks.
    pub fn check_health(
        documents_loaded: usize,
        reasoning_mode: &str,
        embedding_model: &str,
    ) -> HealthRes {
        let status = if documents_loaded == 0 {
            "degraded"
        } else {
            "healthy"
        };

        HealthRes {
            ok: true,
            status: status.into(),
            documents_loaded,
            reasoning_mode: reasoning_mode.into(),
            embedding_model: embedding_model.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_health_reports_degraded_for_empty_store() {
        let res = HealthService::check_health(0, "heuristic", "hashing-256");
        assert!(res.ok);
        assert_eq!(res.status, "degraded");

        let res = HealthService::check_health(12, "llm", "hashing-256");
        assert_eq!(res.status, "healthy");
        assert_eq!(res.documents_loaded, 12);
    }
}
