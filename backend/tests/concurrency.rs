//! Concurrent access to a shared `JobManager`.

use std::sync::Barrier;
use std::thread;

use ldifgen::{GenerationOptions, JobError, JobInput, JobManager, JobStatus};

const USERS: &str = "id,name,email\n1,Ann Lee,ann@example.com\n2,Bo Chen,bo@example.com\n";

#[test]
fn only_one_processor_wins() {
    let manager = JobManager::default();
    let job = manager
        .create(JobInput::csv(USERS), "user", GenerationOptions::default())
        .unwrap();

    let barrier = Barrier::new(2);
    let results: Vec<_> = thread::scope(|scope| {
        let workers: Vec<_> = (0..2)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    manager.process(&job.job_id)
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    let completed: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].status, JobStatus::Completed);
    assert_eq!(completed[0].output_records, 2);

    let rejected = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(matches!(rejected, JobError::InvalidState { action: "process", .. }));

    assert_eq!(manager.get(&job.job_id).unwrap().status, JobStatus::Completed);
}

#[test]
fn independent_jobs_process_in_parallel() {
    let manager = JobManager::default();
    let ids: Vec<String> = (0..8)
        .map(|_| {
            manager
                .create(JobInput::csv(USERS), "user", GenerationOptions::default())
                .unwrap()
                .job_id
        })
        .collect();

    thread::scope(|scope| {
        for id in &ids {
            let manager = &manager;
            scope.spawn(move || manager.process(id).unwrap());
        }
    });

    let completed = manager.list(Some(JobStatus::Completed));
    assert_eq!(completed.len(), ids.len());
    // creation order survives
    let listed: Vec<&str> = completed.iter().map(|job| job.job_id.as_str()).collect();
    let expected: Vec<&str> = ids.iter().map(String::as_str).collect();
    assert_eq!(listed, expected);
}

#[test]
fn reads_during_processing_see_consistent_snapshots() {
    let manager = JobManager::default();
    let mut csv = String::from("id,name,email\n");
    for i in 0..500 {
        csv.push_str(&format!("{},Person {},p{}@example.com\n", i, i, i));
    }
    let job = manager
        .create(JobInput::csv(csv), "user", GenerationOptions::default())
        .unwrap();

    thread::scope(|scope| {
        scope.spawn(|| manager.process(&job.job_id).unwrap());
        scope.spawn(|| {
            let mut last = 0;
            loop {
                let snapshot = manager.get(&job.job_id).unwrap();
                assert!(snapshot.progress_percentage >= last);
                last = snapshot.progress_percentage;
                match snapshot.status {
                    JobStatus::Completed => {
                        assert_eq!(snapshot.progress_percentage, 100);
                        assert!(snapshot.output.is_some());
                        break;
                    }
                    JobStatus::Pending | JobStatus::Processing => {
                        assert!(snapshot.output.is_none());
                        thread::yield_now();
                    }
                    other => panic!("unexpected status {}", other),
                }
            }
        });
    });
}
