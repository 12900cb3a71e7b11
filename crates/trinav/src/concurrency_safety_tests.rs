//! Concurrency safety tests for the navigator
//!
//! Many threads submit requests through cloned [`Navigator`] handles while a
//! single processing context drives the scheduler, either a pump loop on the
//! test thread or a [`ThreadedNavigator`].

use crate::test_mesh_helpers::*;
use crate::{
    MasterNavigator, NavFailure, NavRequestState, NavigatorConfig, Navigator, ThreadedNavigator,
    ThreadedNavigatorConfig,
};
use glam::Vec3;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use trinav_common::Result;

const WAIT: Duration = Duration::from_secs(10);

fn grid_point(i: usize, j: usize) -> Vec3 {
    Vec3::new(i as f32 + 0.3, 0.0, j as f32 + 0.2)
}

fn start_threaded(size: usize) -> Result<ThreadedNavigator> {
    let config = ThreadedNavigatorConfig::new(NavigatorConfig::new().with_search_pool_size(4))
        .with_frame_length(Duration::from_millis(1))
        .with_maintenance_frequency(Duration::from_millis(20));
    ThreadedNavigator::start(Arc::new(create_grid_mesh(size, size)?), config)
}

#[cfg(test)]
mod threaded_navigator_tests {
    use super::*;

    #[test]
    fn test_concurrent_path_requests() -> Result<()> {
        let threaded = start_threaded(10)?;
        let num_threads = 8;
        let requests_per_thread = 20;

        let handles: Vec<_> = (0..num_threads)
            .map(|thread_id| {
                let navigator = threaded.navigator();
                thread::spawn(move || {
                    let mut ids = Vec::new();
                    for i in 0..requests_per_thread {
                        // Threads share goals, so many requests hit the cache.
                        let start = grid_point(thread_id % 3, 0);
                        let goal = grid_point(9, i % 5);
                        let request = navigator.get_path(start, goal);
                        assert_eq!(request.wait_timeout(WAIT), NavRequestState::Complete);
                        let path = request.data().expect("completed request should hold a path");
                        assert!(path.cell_count() > 0);
                        ids.push(((thread_id % 3, i % 5), path.id()));
                    }
                    ids
                })
            })
            .collect();

        let mut seen: HashMap<(usize, usize), u64> = HashMap::new();
        for handle in handles {
            for (key, id) in handle.join().expect("Thread panicked") {
                // Paths live for 60 s by default, so identical pairs share an id.
                let first = *seen.entry(key).or_insert(id);
                assert_eq!(first, id, "pair {key:?} should be served one cached path");
            }
        }
        assert_eq!(seen.len(), 15);
        Ok(())
    }

    #[test]
    fn test_concurrent_location_queries() -> Result<()> {
        let threaded = start_threaded(4)?;
        let handles: Vec<_> = (0..6)
            .map(|thread_id| {
                let navigator = threaded.navigator();
                thread::spawn(move || {
                    for i in 0..50 {
                        let x = (thread_id as f32 * 0.5 + i as f32 * 0.07) % 4.0;
                        let point = Vec3::new(x, 0.0, 1.5);
                        let valid = navigator.is_valid_location(point, 0.1);
                        assert_eq!(valid.wait_timeout(WAIT), NavRequestState::Complete);
                        assert_eq!(valid.data(), Some(true));

                        let off = Vec3::new(x + 10.0, 0.0, 1.5);
                        let nearest = navigator.get_nearest_valid_location(off);
                        assert_eq!(nearest.wait_timeout(WAIT), NavRequestState::Complete);
                        assert!(nearest.data().is_some_and(|p| p.x <= 4.0 + 1e-4));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("Thread panicked");
        }
        Ok(())
    }

    #[test]
    fn test_repairs_and_keep_alive_from_threads() -> Result<()> {
        let threaded = start_threaded(6)?;
        let navigator = threaded.navigator();
        let request = navigator.get_path(grid_point(1, 1), grid_point(5, 5));
        assert_eq!(request.wait_timeout(WAIT), NavRequestState::Complete);
        let path = request.data().expect("path");

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let navigator = threaded.navigator();
                let path = path.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        navigator.keep_path_alive(&path);
                        let repair = navigator.repair_path(grid_point(0, 1), &path);
                        repair.wait_timeout(WAIT);
                        assert!(repair.is_finished());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("Thread panicked");
        }

        assert!(!path.is_disposed());
        assert!(path.get_target(grid_point(0, 1)).is_some());
        Ok(())
    }

    #[test]
    fn test_dispose_is_visible_to_all_handles() -> Result<()> {
        let threaded = start_threaded(3)?;
        let handles: Vec<Navigator> = (0..4).map(|_| threaded.navigator()).collect();

        threaded.dispose();
        threaded.dispose();
        assert!(threaded.is_disposed());
        for navigator in &handles {
            assert!(navigator.is_disposed());
            let request = navigator.get_path(grid_point(0, 0), grid_point(2, 2));
            assert_eq!(request.state(), NavRequestState::Failed);
            assert_eq!(request.failure(), Some(NavFailure::Disposed));
        }
        Ok(())
    }

    #[test]
    fn test_drop_joins_worker() -> Result<()> {
        let threaded = start_threaded(3)?;
        let navigator = threaded.navigator();
        drop(threaded);
        assert!(navigator.is_disposed());
        let request = navigator.is_valid_location(grid_point(1, 1), 0.1);
        assert_eq!(request.wait_timeout(WAIT), NavRequestState::Failed);
        Ok(())
    }

    #[test]
    fn test_invalid_thread_config() -> Result<()> {
        let config = ThreadedNavigatorConfig::default().with_frame_length(Duration::ZERO);
        let result = ThreadedNavigator::start(Arc::new(create_two_cell_mesh()?), config);
        assert!(result.is_err());
        Ok(())
    }
}

#[cfg(test)]
mod pumped_navigator_tests {
    use super::*;

    #[test]
    fn test_pump_with_concurrent_submitters() -> Result<()> {
        let mut nav = MasterNavigator::new(
            Arc::new(create_grid_mesh(8, 8)?),
            NavigatorConfig::new().with_search_pool_size(2),
        )?;
        let num_threads = 6;
        let finished = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..num_threads)
            .map(|thread_id| {
                let navigator = nav.navigator();
                let finished = Arc::clone(&finished);
                thread::spawn(move || {
                    let mut completed = 0;
                    for i in 0..10 {
                        let request =
                            navigator.get_path(grid_point(thread_id, 0), grid_point(7 - i % 8, 7));
                        if request.wait_timeout(WAIT) == NavRequestState::Complete {
                            completed += 1;
                        }
                    }
                    finished.fetch_add(1, Ordering::SeqCst);
                    completed
                })
            })
            .collect();

        while finished.load(Ordering::SeqCst) < num_threads {
            nav.process(true);
            thread::sleep(Duration::from_micros(200));
        }

        let completed: usize = handles
            .into_iter()
            .map(|h| h.join().expect("Thread panicked"))
            .sum();
        assert_eq!(completed, num_threads * 10);
        assert!(!nav.has_pending_work());
        assert_eq!(nav.idle_search_count(), 2);
        Ok(())
    }

    #[test]
    fn test_dispose_fails_requests_from_threads() -> Result<()> {
        let mut nav = MasterNavigator::new(
            Arc::new(create_grid_mesh(4, 4)?),
            NavigatorConfig::default(),
        )?;

        let handles: Vec<_> = (0..4)
            .map(|thread_id| {
                let navigator = nav.navigator();
                thread::spawn(move || {
                    (0..25)
                        .map(|i| navigator.get_path(grid_point(thread_id, 0), grid_point(3, i % 4)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let requests: Vec<_> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("Thread panicked"))
            .collect();
        assert_eq!(nav.pending_path_requests(), 100);

        nav.dispose();
        assert!(requests
            .iter()
            .all(|r| r.failure() == Some(NavFailure::Disposed)));
        assert!(!nav.has_pending_work());
        Ok(())
    }
}
