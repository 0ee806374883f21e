use crate::scheduler::Scheduler;

// App state
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Scheduler,
}
