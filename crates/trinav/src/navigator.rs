//! Time-sliced navigation scheduler
//!
//! A [`MasterNavigator`] owns every search, the pools they come from and the
//! cache of completed paths. It is driven by one processing context through
//! [`process_once`](MasterNavigator::process_once),
//! [`process_all`](MasterNavigator::process_all) or
//! [`process`](MasterNavigator::process).
//!
//! Other threads talk to it through a [`Navigator`] handle, which only
//! enqueues requests and hands back [`NavRequest`] futures. Nothing a caller
//! does blocks on the processing context.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use glam::Vec3;
use trinav_common::Result;
use web_time::Instant;

use crate::astar_search::AStarSearch;
use crate::config::NavigatorConfig;
use crate::master_path::{MasterPath, Path, PathId, NULL_PATH_ID};
use crate::nav_request::{MasterNavRequest, NavRequest};
use crate::repair_search::RepairSearch;
use crate::status::{NavFailure, SearchState};
use crate::tri_cell::CellRef;
use crate::tri_nav_mesh::TriNavMesh;

/// Nodes an idle search keeps allocated after maintenance.
const IDLE_NODE_CAPACITY: usize = 256;

struct PathRequest {
    start: Vec3,
    goal: Vec3,
    future: MasterNavRequest<Path>,
}

struct RepairRequest {
    position: Vec3,
    path: Path,
    future: MasterNavRequest<Path>,
}

enum ImmediateRequest {
    ValidLocation {
        point: Vec3,
        tolerance: f32,
        future: MasterNavRequest<bool>,
    },
    NearestLocation {
        point: Vec3,
        future: MasterNavRequest<Vec3>,
    },
}

impl ImmediateRequest {
    fn fail(&self, reason: NavFailure) {
        match self {
            ImmediateRequest::ValidLocation { future, .. } => {
                future.fail(reason);
            }
            ImmediateRequest::NearestLocation { future, .. } => {
                future.fail(reason);
            }
        }
    }
}

struct Channels {
    paths: Sender<PathRequest>,
    repairs: Sender<RepairRequest>,
    immediate: Sender<ImmediateRequest>,
    keep_alive: Sender<Path>,
    discards: Sender<NavRequest<Path>>,
    disposed: AtomicBool,
}

/// Client handle of a [`MasterNavigator`].
///
/// Cheap to clone and safe to use from any thread.
#[derive(Clone)]
pub struct Navigator {
    channels: Arc<Channels>,
}

impl std::fmt::Debug for Navigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigator")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Navigator {
    fn submit<M, T>(&self, sender: &Sender<M>, message: M, guard: &MasterNavRequest<T>) {
        // A dispose racing the send is caught by the second check.
        if self.is_disposed() || sender.send(message).is_err() || self.is_disposed() {
            guard.fail(NavFailure::Disposed);
        }
    }

    /// Requests a path from `start` to `goal`.
    pub fn get_path(&self, start: Vec3, goal: Vec3) -> NavRequest<Path> {
        let future = MasterNavRequest::new();
        let guard = future.share();
        let request = future.request();
        self.submit(&self.channels.paths, PathRequest { start, goal, future }, &guard);
        request
    }

    /// Requests that `path` be reconnected to `position`.
    ///
    /// On success the same path, with its id unchanged, is published.
    pub fn repair_path(&self, position: Vec3, path: &Path) -> NavRequest<Path> {
        let future = MasterNavRequest::new();
        let guard = future.share();
        let request = future.request();
        let message = RepairRequest {
            position,
            path: path.clone(),
            future,
        };
        self.submit(&self.channels.repairs, message, &guard);
        request
    }

    /// Checks whether `point` lies within `tolerance` of the mesh surface.
    ///
    /// Fails with `InvalidLocation` when no cell column holds the point.
    pub fn is_valid_location(&self, point: Vec3, tolerance: f32) -> NavRequest<bool> {
        let future = MasterNavRequest::new();
        let guard = future.share();
        let request = future.request();
        let message = ImmediateRequest::ValidLocation {
            point,
            tolerance,
            future,
        };
        self.submit(&self.channels.immediate, message, &guard);
        request
    }

    /// Finds the closest position on the mesh to `point`.
    pub fn get_nearest_valid_location(&self, point: Vec3) -> NavRequest<Vec3> {
        let future = MasterNavRequest::new();
        let guard = future.share();
        let request = future.request();
        let message = ImmediateRequest::NearestLocation { point, future };
        self.submit(&self.channels.immediate, message, &guard);
        request
    }

    /// Marks `path` as still in use. No-op for disposed or foreign paths.
    pub fn keep_path_alive(&self, path: &Path) {
        if !self.is_disposed() && !path.is_disposed() {
            let _ = self.channels.keep_alive.send(path.clone());
        }
    }

    /// Cancels a path or repair request that has not finished yet.
    pub fn discard_path_request(&self, request: &NavRequest<Path>) {
        if !self.is_disposed() && !request.is_finished() {
            let _ = self.channels.discards.send(request.clone());
        }
    }

    /// Shuts the navigator down. Cleanup happens on the next processing pass.
    pub fn dispose(&self) {
        self.channels.disposed.store(true, Ordering::Release);
    }

    pub fn is_disposed(&self) -> bool {
        self.channels.disposed.load(Ordering::Acquire)
    }
}

struct PathJob {
    search: AStarSearch,
    future: MasterNavRequest<Path>,
}

struct RepairJob {
    search: RepairSearch,
    position: Vec3,
    path: Arc<MasterPath>,
    // Goal of the caller's view
    goal: Vec3,
    // Corridor at admission; repair results index into it
    corridor: Vec<CellRef>,
    future: MasterNavRequest<Path>,
}

struct ActivePath {
    path: Arc<MasterPath>,
    last_touched: Instant,
}

type CacheKey = (CellRef, CellRef);

fn cache_key(path: &MasterPath) -> Option<CacheKey> {
    Some((path.start_cell()?, path.goal_cell()?))
}

/// The scheduler. Owns all searches, pools and cached paths.
pub struct MasterNavigator {
    mesh: Arc<TriNavMesh>,
    config: NavigatorConfig,
    handle: Navigator,

    path_rx: Receiver<PathRequest>,
    repair_rx: Receiver<RepairRequest>,
    immediate_rx: Receiver<ImmediateRequest>,
    keep_alive_rx: Receiver<Path>,
    discard_rx: Receiver<NavRequest<Path>>,

    pending_paths: VecDeque<PathRequest>,
    pending_repairs: VecDeque<RepairRequest>,
    path_jobs: Vec<PathJob>,
    repair_jobs: Vec<RepairJob>,

    idle_searches: Vec<AStarSearch>,
    idle_repairs: Vec<RepairSearch>,
    corridor_pool: Vec<(Vec<CellRef>, Vec<u8>)>,
    cache: HashMap<CacheKey, ActivePath>,

    next_path_id: PathId,
    disposed: bool,
}

impl std::fmt::Debug for MasterNavigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterNavigator")
            .field("config", &self.config)
            .field("path_jobs", &self.path_jobs.len())
            .field("repair_jobs", &self.repair_jobs.len())
            .field("active_paths", &self.cache.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl MasterNavigator {
    /// Creates a scheduler over `mesh` with pre-allocated search pools.
    pub fn new(mesh: Arc<TriNavMesh>, config: NavigatorConfig) -> Result<Self> {
        let config = config.normalized();

        let (paths, path_rx) = unbounded();
        let (repairs, repair_rx) = unbounded();
        let (immediate, immediate_rx) = unbounded();
        let (keep_alive, keep_alive_rx) = unbounded();
        let (discards, discard_rx) = unbounded();
        let handle = Navigator {
            channels: Arc::new(Channels {
                paths,
                repairs,
                immediate,
                keep_alive,
                discards,
                disposed: AtomicBool::new(false),
            }),
        };

        let idle_searches = (0..config.search_pool_size)
            .map(|_| AStarSearch::new(config.heuristic))
            .collect();
        let idle_repairs = (0..config.repair_pool_size())
            .map(|_| RepairSearch::new())
            .collect();

        log::info!(
            "Created navigator over {} cells: {} searches, {} repair searches, caching {}",
            mesh.cell_count(),
            config.search_pool_size,
            config.repair_pool_size(),
            if config.caching_enabled() { "on" } else { "off" }
        );

        Ok(Self {
            mesh,
            config,
            handle,
            path_rx,
            repair_rx,
            immediate_rx,
            keep_alive_rx,
            discard_rx,
            pending_paths: VecDeque::new(),
            pending_repairs: VecDeque::new(),
            path_jobs: Vec::new(),
            repair_jobs: Vec::new(),
            idle_searches,
            idle_repairs,
            corridor_pool: Vec::new(),
            cache: HashMap::new(),
            next_path_id: NULL_PATH_ID,
            disposed: false,
        })
    }

    /// A client handle for other threads.
    pub fn navigator(&self) -> Navigator {
        self.handle.clone()
    }

    pub fn mesh(&self) -> &Arc<TriNavMesh> {
        &self.mesh
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    pub fn get_path(&self, start: Vec3, goal: Vec3) -> NavRequest<Path> {
        self.handle.get_path(start, goal)
    }

    pub fn repair_path(&self, position: Vec3, path: &Path) -> NavRequest<Path> {
        self.handle.repair_path(position, path)
    }

    pub fn is_valid_location(&self, point: Vec3, tolerance: f32) -> NavRequest<bool> {
        self.handle.is_valid_location(point, tolerance)
    }

    pub fn get_nearest_valid_location(&self, point: Vec3) -> NavRequest<Vec3> {
        self.handle.get_nearest_valid_location(point)
    }

    pub fn keep_path_alive(&self, path: &Path) {
        self.handle.keep_path_alive(path)
    }

    pub fn discard_path_request(&self, request: &NavRequest<Path>) {
        self.handle.discard_path_request(request)
    }

    /// Runs one scheduling pass: every active job advances one step.
    ///
    /// Returns false once the navigator is disposed.
    pub fn process_once(&mut self, run_maintenance: bool) -> bool {
        if !self.begin(run_maintenance) {
            return false;
        }
        self.admit();
        self.service_immediate();
        self.step_jobs();
        log::trace!(
            "Pass done: {} path jobs, {} repair jobs, {} cached paths",
            self.path_jobs.len(),
            self.repair_jobs.len(),
            self.cache.len()
        );
        true
    }

    /// Runs passes until all queued and active work has finished.
    pub fn process_all(&mut self, run_maintenance: bool) -> bool {
        if !self.begin(run_maintenance) {
            return false;
        }
        loop {
            self.admit();
            self.service_immediate();
            if self.path_jobs.is_empty() && self.repair_jobs.is_empty() {
                if !self.has_pending_work() {
                    break;
                }
                continue;
            }
            self.step_jobs();
        }
        true
    }

    /// Runs passes until the work is done or the frame timeslice is used up.
    ///
    /// The timeslice is only checked between passes, so every active search
    /// advances at least one step per call.
    pub fn process(&mut self, run_maintenance: bool) -> bool {
        let deadline = Instant::now() + self.config.max_frame_timeslice;
        if !self.begin(run_maintenance) {
            return false;
        }
        loop {
            self.admit();
            self.service_immediate();
            if self.path_jobs.is_empty() && self.repair_jobs.is_empty() {
                break;
            }
            self.step_jobs();
            if Instant::now() >= deadline {
                break;
            }
        }
        true
    }

    fn begin(&mut self, run_maintenance: bool) -> bool {
        if self.disposed {
            return false;
        }
        if self.handle.is_disposed() {
            self.dispose();
            return false;
        }
        self.handle_discards();
        self.handle_keep_alives(Instant::now());
        if run_maintenance {
            self.maintain(Instant::now());
        }
        true
    }

    fn drain_channels(&mut self) {
        self.pending_paths.extend(self.path_rx.try_iter());
        self.pending_repairs.extend(self.repair_rx.try_iter());
    }

    fn handle_discards(&mut self) {
        self.drain_channels();
        let discards: Vec<NavRequest<Path>> = self.discard_rx.try_iter().collect();
        for discard in discards {
            self.pending_paths.retain(|r| {
                let matched = discard.same_request(&r.future);
                if matched {
                    r.future.fail(NavFailure::Cancelled);
                }
                !matched
            });
            self.pending_repairs.retain(|r| {
                let matched = discard.same_request(&r.future);
                if matched {
                    r.future.fail(NavFailure::Cancelled);
                }
                !matched
            });

            if let Some(i) = self
                .path_jobs
                .iter()
                .position(|j| discard.same_request(&j.future))
            {
                let mut job = self.path_jobs.remove(i);
                job.future.fail(NavFailure::Cancelled);
                job.search.reset();
                self.idle_searches.push(job.search);
                log::debug!("Discarded path job");
            }
            if let Some(i) = self
                .repair_jobs
                .iter()
                .position(|j| discard.same_request(&j.future))
            {
                let mut job = self.repair_jobs.remove(i);
                job.future.fail(NavFailure::Cancelled);
                job.search.reset();
                self.idle_repairs.push(job.search);
                self.recycle_cells(job.corridor);
                log::debug!("Discarded repair job");
            }
        }
    }

    fn handle_keep_alives(&mut self, now: Instant) {
        for path in self.keep_alive_rx.try_iter() {
            let master = path.master();
            let Some(key) = cache_key(master) else {
                continue;
            };
            if let Some(entry) = self.cache.get_mut(&key) {
                if Arc::ptr_eq(&entry.path, master) {
                    entry.last_touched = now;
                }
            }
        }
    }

    /// Evicts paths untouched for longer than the maximum age and trims the
    /// idle pools.
    pub(crate) fn maintain(&mut self, now: Instant) {
        let max_age = self.config.max_path_age;
        let expired: Vec<CacheKey> = self
            .cache
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_touched) > max_age)
            .map(|(key, _)| *key)
            .collect();
        for key in &expired {
            if let Some(entry) = self.cache.remove(key) {
                self.dispose_path(&entry.path);
            }
        }
        if !expired.is_empty() {
            log::debug!(
                "Evicted {} aged paths, {} remain",
                expired.len(),
                self.cache.len()
            );
        }

        for search in &mut self.idle_searches {
            search.cleanup(IDLE_NODE_CAPACITY);
        }
        for search in &mut self.idle_repairs {
            search.cleanup(IDLE_NODE_CAPACITY);
        }
        self.corridor_pool.truncate(self.config.search_pool_size);
    }

    fn admit(&mut self) {
        self.drain_channels();
        let now = Instant::now();

        while let Some(request) = self.pending_paths.pop_front() {
            if request.future.is_finished() {
                continue;
            }
            if self.idle_searches.is_empty() {
                self.pending_paths.push_front(request);
                break;
            }
            self.admit_path(request, now);
        }

        while let Some(request) = self.pending_repairs.pop_front() {
            if request.future.is_finished() {
                continue;
            }
            if self.idle_repairs.is_empty() {
                self.pending_repairs.push_front(request);
                break;
            }
            self.admit_repair(request, now);
        }
    }

    fn admit_path(&mut self, request: PathRequest, now: Instant) {
        let PathRequest {
            start,
            goal,
            future,
        } = request;
        let start_cell = self.mesh.closest_cell(start, true);
        let goal_cell = self.mesh.closest_cell(goal, true);
        let (Some((start_cell, _)), Some((goal_cell, _))) = (start_cell, goal_cell) else {
            log::debug!("Path request {start} -> {goal} is off the mesh");
            future.fail(NavFailure::InvalidLocation);
            return;
        };

        if let Some(entry) = self.cache.get_mut(&(start_cell, goal_cell)) {
            if !entry.path.is_disposed() {
                entry.last_touched = now;
                log::debug!("Cache hit for {start_cell} -> {goal_cell}");
                future.complete(Path::new(Arc::clone(&entry.path), goal));
                return;
            }
        }

        let Some(mut search) = self.idle_searches.pop() else {
            future.fail(NavFailure::SearchExhausted);
            return;
        };
        search.set_heuristic(self.config.heuristic);
        search.initialize(start, goal, start_cell, goal_cell);
        self.path_jobs.push(PathJob { search, future });
    }

    fn admit_repair(&mut self, request: RepairRequest, now: Instant) {
        let RepairRequest {
            position,
            path,
            future,
        } = request;
        let master = Arc::clone(path.master());
        let goal = path.goal();
        if master.is_disposed() {
            future.fail(NavFailure::Disposed);
            return;
        }
        if !Arc::ptr_eq(master.mesh(), &self.mesh) {
            future.fail(NavFailure::InvalidLocation);
            return;
        }
        let Some((cell, _)) = self.mesh.closest_cell(position, true) else {
            future.fail(NavFailure::InvalidLocation);
            return;
        };

        let mut corridor = self.take_cells();
        corridor.extend(master.cells());

        // Still on the corridor: drop the cells already passed.
        if let Some(index) = corridor.iter().rposition(|c| *c == cell) {
            let old_key = cache_key(&master);
            master.truncate_front(index, position);
            self.rekey(&master, old_key, now);
            self.recycle_cells(corridor);
            log::debug!("Repair of path {} truncated at {index}", master.id());
            future.complete(path);
            return;
        }

        let Some(mut search) = self.idle_repairs.pop() else {
            self.recycle_cells(corridor);
            future.fail(NavFailure::RepairExhausted);
            return;
        };
        search.initialize(position, cell, &corridor, self.config.repair_search_depth as usize);
        self.repair_jobs.push(RepairJob {
            search,
            position,
            path: master,
            goal,
            corridor,
            future,
        });
    }

    fn service_immediate(&mut self) {
        for request in self.immediate_rx.try_iter() {
            match request {
                ImmediateRequest::ValidLocation {
                    point,
                    tolerance,
                    future,
                } => {
                    let cells = self.mesh.cells_for_point(point.x, point.z);
                    if cells.is_empty() {
                        future.fail(NavFailure::InvalidLocation);
                    } else {
                        let valid = cells.iter().any(|id| {
                            (self.mesh.cell(*id).plane_y(point.x, point.z) - point.y).abs()
                                <= tolerance
                        });
                        future.complete(valid);
                    }
                }
                ImmediateRequest::NearestLocation { point, future } => {
                    match self.mesh.closest_cell(point, false) {
                        Some((_, nearest)) => {
                            future.complete(nearest);
                        }
                        None => {
                            future.fail(NavFailure::InvalidLocation);
                        }
                    }
                }
            }
        }
    }

    /// Advances every path and repair job one step.
    fn step_jobs(&mut self) {
        let mut i = 0;
        while i < self.path_jobs.len() {
            let state = self.path_jobs[i].search.process(&self.mesh);
            if state.is_finished() {
                let job = self.path_jobs.remove(i);
                self.finish_path_job(job, state);
            } else {
                i += 1;
            }
        }

        let mut i = 0;
        while i < self.repair_jobs.len() {
            let state = self.repair_jobs[i].search.process(&self.mesh);
            if state.is_finished() {
                let job = self.repair_jobs.remove(i);
                self.finish_repair_job(job, state);
            } else {
                i += 1;
            }
        }
    }

    fn finish_path_job(&mut self, job: PathJob, state: SearchState) {
        let PathJob { mut search, future } = job;
        if state == SearchState::Complete {
            let published = self.publish_path(&search);
            match published {
                Some(path) => {
                    future.complete(path);
                }
                None => {
                    future.fail(NavFailure::SearchExhausted);
                }
            }
        } else {
            log::debug!(
                "No path from {:?} to {:?} after {} iterations",
                search.start_cell(),
                search.goal_cell(),
                search.iterations()
            );
            future.fail(NavFailure::SearchExhausted);
        }
        search.reset();
        self.idle_searches.push(search);
    }

    fn publish_path(&mut self, search: &AStarSearch) -> Option<Path> {
        let key = (search.start_cell()?, search.goal_cell()?);
        let now = Instant::now();

        if let Some(entry) = self.cache.get_mut(&key) {
            if !entry.path.is_disposed() {
                entry.last_touched = now;
                log::debug!("Search for {} -> {} matched a cached path", key.0, key.1);
                return Some(Path::new(Arc::clone(&entry.path), search.goal()));
            }
        }

        let mut cells = self.take_cells();
        cells.extend_from_slice(search.path());
        let walls = self.take_walls();
        let id = self.allocate_path_id();
        let master = match MasterPath::new(
            id,
            Arc::clone(&self.mesh),
            cells,
            walls,
            search.start(),
        ) {
            Ok(master) => Arc::new(master),
            Err(e) => {
                log::warn!("Discarding search result: {e}");
                return None;
            }
        };
        log::debug!(
            "Path {id} found: {} cells in {} iterations",
            master.cell_count(),
            search.iterations()
        );

        if self.config.caching_enabled() {
            let displaced = self.cache.insert(
                key,
                ActivePath {
                    path: Arc::clone(&master),
                    last_touched: now,
                },
            );
            if let Some(old) = displaced {
                self.dispose_path(&old.path);
            }
        }
        Some(Path::new(master, search.goal()))
    }

    fn finish_repair_job(&mut self, job: RepairJob, state: SearchState) {
        let RepairJob {
            mut search,
            position,
            path,
            goal,
            corridor,
            future,
        } = job;

        let repaired = match search.result() {
            Some((index, found)) if state == SearchState::Complete && !path.is_disposed() => {
                let mut cells = self.take_cells();
                cells.extend_from_slice(found);
                cells.extend_from_slice(&corridor[index + 1..]);
                let walls = self.take_walls();
                let old_key = cache_key(&path);
                match path.replace_corridor(cells, walls, position) {
                    Ok(old) => {
                        self.corridor_pool.push(old);
                        self.rekey(&path, old_key, Instant::now());
                        true
                    }
                    Err(e) => {
                        log::warn!("Discarding repair result: {e}");
                        false
                    }
                }
            }
            _ => false,
        };

        if repaired {
            log::debug!("Repaired path {} ({} cells)", path.id(), path.cell_count());
            future.complete(Path::new(Arc::clone(&path), goal));
        } else if path.is_disposed() {
            future.fail(NavFailure::Disposed);
        } else {
            log::debug!(
                "Repair of path {} exhausted depth {}",
                path.id(),
                search.max_depth()
            );
            future.fail(NavFailure::RepairExhausted);
        }

        search.reset();
        self.idle_repairs.push(search);
        self.recycle_cells(corridor);
    }

    /// Moves a cached path to the key of its current corridor.
    fn rekey(&mut self, path: &Arc<MasterPath>, old_key: Option<CacheKey>, now: Instant) {
        let Some(old_key) = old_key else {
            return;
        };
        let cached = self
            .cache
            .get(&old_key)
            .is_some_and(|entry| Arc::ptr_eq(&entry.path, path));
        if !cached {
            return;
        }
        self.cache.remove(&old_key);
        let Some(new_key) = cache_key(path) else {
            return;
        };
        let displaced = self.cache.insert(
            new_key,
            ActivePath {
                path: Arc::clone(path),
                last_touched: now,
            },
        );
        if let Some(old) = displaced {
            if !Arc::ptr_eq(&old.path, path) {
                self.dispose_path(&old.path);
            }
        }
    }

    fn dispose_path(&mut self, path: &MasterPath) {
        if let Some(storage) = path.dispose() {
            self.corridor_pool.push(storage);
        }
    }

    fn allocate_path_id(&mut self) -> PathId {
        self.next_path_id = self.next_path_id.wrapping_add(1);
        if self.next_path_id == NULL_PATH_ID {
            self.next_path_id = 1;
        }
        self.next_path_id
    }

    fn take_cells(&mut self) -> Vec<CellRef> {
        match self.corridor_pool.iter().position(|(cells, _)| cells.capacity() > 0) {
            Some(i) => {
                let (mut cells, walls) = self.corridor_pool.swap_remove(i);
                cells.clear();
                if walls.capacity() > 0 {
                    self.corridor_pool.push((Vec::new(), walls));
                }
                cells
            }
            None => Vec::new(),
        }
    }

    fn take_walls(&mut self) -> Vec<u8> {
        match self.corridor_pool.iter().position(|(_, walls)| walls.capacity() > 0) {
            Some(i) => {
                let (cells, mut walls) = self.corridor_pool.swap_remove(i);
                walls.clear();
                if cells.capacity() > 0 {
                    self.corridor_pool.push((cells, Vec::new()));
                }
                walls
            }
            None => Vec::new(),
        }
    }

    fn recycle_cells(&mut self, cells: Vec<CellRef>) {
        if cells.capacity() > 0 {
            self.corridor_pool.push((cells, Vec::new()));
        }
    }

    /// Fails every pending and active request, disposes every cached path and
    /// frees the pools. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.handle.dispose();
        self.drain_channels();

        let failed_paths = self.pending_paths.len() + self.path_jobs.len();
        let failed_repairs = self.pending_repairs.len() + self.repair_jobs.len();
        for request in self.pending_paths.drain(..) {
            request.future.fail(NavFailure::Disposed);
        }
        for request in self.pending_repairs.drain(..) {
            request.future.fail(NavFailure::Disposed);
        }
        for job in self.path_jobs.drain(..) {
            job.future.fail(NavFailure::Disposed);
        }
        for job in self.repair_jobs.drain(..) {
            job.future.fail(NavFailure::Disposed);
        }
        for request in self.immediate_rx.try_iter() {
            request.fail(NavFailure::Disposed);
        }
        self.keep_alive_rx.try_iter().for_each(drop);
        self.discard_rx.try_iter().for_each(drop);

        let cached = self.cache.len();
        for (_, entry) in self.cache.drain() {
            entry.path.dispose();
        }
        self.idle_searches = Vec::new();
        self.idle_repairs = Vec::new();
        self.corridor_pool = Vec::new();

        log::info!(
            "Navigator disposed: failed {failed_paths} path and {failed_repairs} repair requests, disposed {cached} paths"
        );
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed || self.handle.is_disposed()
    }

    /// Path requests not yet admitted as jobs.
    pub fn pending_path_requests(&self) -> usize {
        self.pending_paths.len() + self.path_rx.len()
    }

    /// Repair requests not yet admitted as jobs.
    pub fn pending_repair_requests(&self) -> usize {
        self.pending_repairs.len() + self.repair_rx.len()
    }

    /// Validity and nearest-location requests not yet serviced.
    pub fn pending_immediate_requests(&self) -> usize {
        self.immediate_rx.len()
    }

    pub fn active_path_jobs(&self) -> usize {
        self.path_jobs.len()
    }

    pub fn active_repair_jobs(&self) -> usize {
        self.repair_jobs.len()
    }

    /// Number of cached paths.
    pub fn active_path_count(&self) -> usize {
        self.cache.len()
    }

    pub fn idle_search_count(&self) -> usize {
        self.idle_searches.len()
    }

    pub fn idle_repair_search_count(&self) -> usize {
        self.idle_repairs.len()
    }

    /// True if any request is queued or any job is running.
    pub fn has_pending_work(&self) -> bool {
        self.pending_path_requests() > 0
            || self.pending_repair_requests() > 0
            || self.pending_immediate_requests() > 0
            || !self.path_jobs.is_empty()
            || !self.repair_jobs.is_empty()
    }
}

#[cfg(test)]
impl MasterNavigator {
    /// Iterations run by each active path job and repair job.
    pub(crate) fn job_iterations(&self) -> (Vec<usize>, Vec<usize>) {
        (
            self.path_jobs.iter().map(|j| j.search.iterations()).collect(),
            self.repair_jobs.iter().map(|j| j.search.iterations()).collect(),
        )
    }
}

impl Drop for MasterNavigator {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_mesh_helpers::*;
    use crate::NavRequestState;

    fn navigator(mesh: TriNavMesh, config: NavigatorConfig) -> Result<MasterNavigator> {
        MasterNavigator::new(Arc::new(mesh), config)
    }

    #[test]
    fn test_new_navigator_pools() -> Result<()> {
        let nav = navigator(create_two_cell_mesh()?, NavigatorConfig::new().with_search_pool_size(6))?;
        assert_eq!(nav.idle_search_count(), 6);
        assert_eq!(nav.idle_repair_search_count(), 3);
        assert!(!nav.has_pending_work());
        assert!(!nav.is_disposed());
        Ok(())
    }

    #[test]
    fn test_requests_wait_for_processing() -> Result<()> {
        let mesh = create_two_cell_mesh()?;
        let (a, b) = (centroid(&mesh, 0), centroid(&mesh, 1));
        let mut nav = navigator(mesh, NavigatorConfig::default())?;
        let request = nav.get_path(a, b);
        assert_eq!(request.state(), NavRequestState::Processing);
        assert_eq!(nav.pending_path_requests(), 1);

        assert!(nav.process_once(false));
        assert_eq!(nav.pending_path_requests(), 0);
        assert!(nav.process_all(false));
        assert_eq!(request.state(), NavRequestState::Complete);
        Ok(())
    }

    #[test]
    fn test_saturated_pool_queues_requests() -> Result<()> {
        let mesh = create_grid_mesh(8, 8)?;
        let start = Vec3::new(0.2, 0.0, 0.2);
        let goals = [Vec3::new(7.5, 0.0, 7.5), Vec3::new(7.5, 0.0, 0.5), Vec3::new(0.5, 0.0, 7.5)];
        let mut nav = navigator(mesh, NavigatorConfig::new().with_search_pool_size(1))?;
        let requests: Vec<_> = goals.iter().map(|g| nav.get_path(start, *g)).collect();

        nav.process_once(false);
        assert_eq!(nav.active_path_jobs(), 1);
        assert_eq!(nav.idle_search_count(), 0);
        assert_eq!(nav.pending_path_requests(), 2);

        nav.process_all(false);
        assert!(requests.iter().all(|r| r.state() == NavRequestState::Complete));
        assert_eq!(nav.idle_search_count(), 1);
        assert_eq!(nav.active_path_count(), 3);
        Ok(())
    }

    #[test]
    fn test_process_respects_timeslice() -> Result<()> {
        let mesh = create_grid_mesh(4, 4)?;
        let mut nav = navigator(
            mesh,
            NavigatorConfig::new().with_max_frame_timeslice(std::time::Duration::ZERO),
        )?;
        let request = nav.get_path(Vec3::new(0.2, 0.0, 0.2), Vec3::new(3.8, 0.0, 3.8));
        // A zero budget still runs one step per call.
        assert!(nav.process(false));
        assert_eq!(request.state(), NavRequestState::Processing);
        let mut calls = 1;
        while !request.is_finished() && calls < 1000 {
            nav.process(false);
            calls += 1;
        }
        assert_eq!(request.state(), NavRequestState::Complete);
        assert!(calls > 1);
        Ok(())
    }

    #[test]
    fn test_path_ids_are_never_null() -> Result<()> {
        let mut nav = navigator(create_two_cell_mesh()?, NavigatorConfig::default())?;
        nav.next_path_id = PathId::MAX;
        assert_eq!(nav.allocate_path_id(), 1);
        assert_eq!(nav.allocate_path_id(), 2);
        Ok(())
    }
}
