use protocol::RunMode;

pub const EXECUTE_TESTS: &str = "execute_tests";
pub const DISCOVER_TESTS: &str = "discover_tests";

/// One externally visible operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub name: &'static str,
    pub mode: RunMode,
    pub title: &'static str,
    pub description: &'static str,
}

/// Maps operation names to pipeline modes. Built once at startup and
/// handed to the transport.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    routes: Vec<Route>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self {
            routes: vec![
                Route {
                    name: EXECUTE_TESTS,
                    mode: RunMode::Execute,
                    title: "Execute Tests",
                    description: "Run the project's pytest suite, or a selection of it, and \
                                  return per-test outcomes with a summary. Failing tests are \
                                  reported as results, not errors.",
                },
                Route {
                    name: DISCOVER_TESTS,
                    mode: RunMode::Discover,
                    title: "Discover Tests",
                    description: "Collect the project's pytest tests without running them and \
                                  return their node ids with file, module, class and function.",
                },
            ],
        }
    }

    pub fn resolve(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.name == name)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}
