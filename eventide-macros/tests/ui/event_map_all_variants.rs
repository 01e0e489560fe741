use eventide_core::typed::EventKind;
use eventide_macros::event_map;
use serde::{Deserialize, Serialize};

#[event_map(prefix = "jobs", kind = JobTopic)]
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEvent {
    Queued { job_id: u64 },
    Progress(u64, u8),
    Cancelled,
}

fn main() {
    let names: Vec<&str> = JobTopic::ALL.iter().map(|k| k.name()).collect();
    assert_eq!(names, ["jobs.Queued", "jobs.Progress", "jobs.Cancelled"]);
}
