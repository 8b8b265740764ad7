/// Read-only per-query configuration consulted by the rewrites.
#[derive(Clone, Debug)]
pub struct Session {
    query_id: String,
    enable_dynamic_filtering: bool,
}

impl Session {
    pub fn new(query_id: impl Into<String>) -> Self {
        Session {
            query_id: query_id.into(),
            enable_dynamic_filtering: false,
        }
    }

    pub fn with_dynamic_filtering(mut self, enabled: bool) -> Self {
        self.enable_dynamic_filtering = enabled;
        self
    }

    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    pub fn dynamic_filtering_enabled(&self) -> bool {
        self.enable_dynamic_filtering
    }
}
