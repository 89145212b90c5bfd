//! Grid-based pathfinding using the A* algorithm.
//!
//! The map is a `width x height` rectangle centred on the origin and
//! discretised into square cells. Non-passable obstacles, grown by the
//! mover's radius, block the cells whose centres they cover; passable slow
//! terrain doubles the cost of its cells. Searches are fully deterministic:
//! equal-cost frontier nodes are ordered by a coordinate tie-breaker.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use ordered_float::OrderedFloat;
use tracing::trace;

use crate::components::{EntityId, ObstacleShape};
use crate::config::RulesConfig;
use crate::geometry::OrientedRect;
use crate::math::Vec2;
use crate::world::EntityStorage;

/// Cell types for the navigation grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CellType {
    /// Normal walkable terrain (cost: 1).
    #[default]
    Walkable,
    /// Impassable terrain.
    Blocked,
    /// Slow terrain with 2x movement cost.
    SlowTerrain,
}

impl CellType {
    /// Movement cost for this cell type, `None` for blocked cells.
    #[must_use]
    pub const fn movement_cost(self) -> Option<f64> {
        match self {
            Self::Walkable => Some(1.0),
            Self::Blocked => None,
            Self::SlowTerrain => Some(2.0),
        }
    }

    /// Returns true if this cell is walkable.
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        !matches!(self, Self::Blocked)
    }
}

/// Navigation grid for pathfinding.
#[derive(Debug, Clone)]
pub struct NavGrid {
    /// Grid width in cells.
    width: u32,
    /// Grid height in cells.
    height: u32,
    /// Cell data stored in row-major order.
    cells: Vec<CellType>,
    /// Size of each cell in world units.
    cell_size: f64,
    /// World position of the corner of cell (0, 0).
    origin: Vec2,
}

impl NavGrid {
    /// All-walkable grid covering a `map_width x map_height` map centred on
    /// the origin.
    #[must_use]
    pub fn for_map(map_width: f64, map_height: f64, cell_size: f64) -> Self {
        let cell_size = if cell_size > 0.0 { cell_size } else { 1.0 };
        let width = cells_along(map_width, cell_size);
        let height = cells_along(map_height, cell_size);
        Self {
            width,
            height,
            cells: vec![CellType::Walkable; (width as usize) * (height as usize)],
            cell_size,
            origin: Vec2::new(-map_width.max(0.0) / 2.0, -map_height.max(0.0) / 2.0),
        }
    }

    /// Grid for `mover` with every obstacle in `world` rasterised.
    ///
    /// Blocking obstacles are grown by the mover's radius plus half a cell
    /// diagonal, so any point inside a walkable cell clears them. The cell the
    /// mover stands in is never blocked, so a unit pressed against a wall
    /// can still path away from it.
    #[must_use]
    pub fn from_world(
        world: &EntityStorage,
        mover: EntityId,
        map_size: (f64, f64),
        config: &RulesConfig,
    ) -> Self {
        let mut grid = Self::for_map(map_size.0, map_size.1, config.path_cell_size);
        let mover_entity = world.get(mover);
        let radius = mover_entity
            .and_then(|e| e.unit.as_ref())
            .map_or(config.default_unit_radius, |u| u.radius);

        for (position, obstacle) in world.obstacles() {
            let cell_type = if !obstacle.passable {
                CellType::Blocked
            } else if obstacle.speed_multiplier < 1.0 {
                CellType::SlowTerrain
            } else {
                continue;
            };
            let margin = if obstacle.passable {
                0.0
            } else {
                radius + config.path_cell_size * std::f64::consts::FRAC_1_SQRT_2
            };
            grid.rasterise(position.value, obstacle.shape, margin, cell_type);
        }

        if let Some(cell) = mover_entity
            .and_then(|e| e.position)
            .and_then(|p| grid.world_to_grid(p.value))
        {
            grid.set_cell(cell.0, cell.1, CellType::Walkable);
        }
        grid
    }

    fn rasterise(&mut self, center: Vec2, shape: ObstacleShape, margin: f64, cell_type: CellType) {
        let (reach, covers): (f64, Box<dyn Fn(Vec2) -> bool>) = match shape {
            ObstacleShape::Circle { radius } => {
                let r = radius + margin;
                (r, Box::new(move |p: Vec2| p.distance(center) < r))
            }
            ObstacleShape::Rect {
                half_width,
                half_depth,
                rotation,
            } => {
                let rect = OrientedRect {
                    center,
                    half_width,
                    half_depth,
                    rotation,
                };
                (
                    (half_width + margin).hypot(half_depth + margin),
                    Box::new(move |p: Vec2| rect.contains(p, margin)),
                )
            }
        };

        let (min_x, min_y) = self.clamped_cell(center - Vec2::new(reach, reach));
        let (max_x, max_y) = self.clamped_cell(center + Vec2::new(reach, reach));
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                if !covers(self.grid_to_world(x, y)) {
                    continue;
                }
                let index = self.coords_to_index(x, y);
                // blocked wins over slow
                if self.cells[index] != CellType::Blocked {
                    self.cells[index] = cell_type;
                }
            }
        }
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Cell size in world units.
    #[must_use]
    pub const fn cell_size(&self) -> f64 {
        self.cell_size
    }

    #[inline]
    fn coords_to_index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    /// Check if coordinates are within grid bounds.
    #[must_use]
    pub fn in_bounds(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }

    /// Get cell type at coordinates, `None` if out of bounds.
    #[must_use]
    pub fn get_cell(&self, x: u32, y: u32) -> Option<CellType> {
        if self.in_bounds(x, y) {
            Some(self.cells[self.coords_to_index(x, y)])
        } else {
            None
        }
    }

    /// Set cell type at coordinates. Returns `false` if out of bounds.
    pub fn set_cell(&mut self, x: u32, y: u32, cell_type: CellType) -> bool {
        if self.in_bounds(x, y) {
            let index = self.coords_to_index(x, y);
            self.cells[index] = cell_type;
            true
        } else {
            false
        }
    }

    /// Check if a cell is walkable.
    #[must_use]
    pub fn is_walkable(&self, x: u32, y: u32) -> bool {
        self.get_cell(x, y).is_some_and(CellType::is_walkable)
    }

    fn is_walkable_signed(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && self.is_walkable(x as u32, y as u32)
    }

    /// Convert a world position to grid coordinates, `None` off the map.
    #[must_use]
    pub fn world_to_grid(&self, pos: Vec2) -> Option<(u32, u32)> {
        let local = pos - self.origin;
        if !local.is_finite() || local.x < 0.0 || local.y < 0.0 {
            return None;
        }
        let x = (local.x / self.cell_size).floor() as i64;
        let y = (local.y / self.cell_size).floor() as i64;
        if x < i64::from(self.width) && y < i64::from(self.height) {
            Some((x as u32, y as u32))
        } else {
            None
        }
    }

    fn clamped_cell(&self, pos: Vec2) -> (u32, u32) {
        let local = pos - self.origin;
        let clamp = |v: f64, cells: u32| -> u32 {
            let c = (v / self.cell_size).floor();
            if c.is_nan() || c < 0.0 {
                0
            } else {
                (c as u64).min(u64::from(cells.saturating_sub(1))) as u32
            }
        };
        (clamp(local.x, self.width), clamp(local.y, self.height))
    }

    /// World position of a cell centre.
    #[must_use]
    pub fn grid_to_world(&self, x: u32, y: u32) -> Vec2 {
        let half = self.cell_size / 2.0;
        Vec2::new(
            self.origin.x + f64::from(x) * self.cell_size + half,
            self.origin.y + f64::from(y) * self.cell_size + half,
        )
    }

    /// Movement cost for a cell, `None` for blocked or out-of-bounds cells.
    #[must_use]
    pub fn movement_cost(&self, x: u32, y: u32) -> Option<f64> {
        self.get_cell(x, y).and_then(CellType::movement_cost)
    }
}

fn cells_along(extent: f64, cell_size: f64) -> u32 {
    if extent.is_finite() && extent > 0.0 {
        ((extent / cell_size).ceil() as u32).max(1)
    } else {
        1
    }
}

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    x: u32,
    y: u32,
    /// g + h
    f_score: OrderedFloat<f64>,
    /// Lower coordinates first on equal scores.
    tie_breaker: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for lowest f first.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.tie_breaker.cmp(&self.tie_breaker),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Direction offsets for 8-directional movement.
const DIRECTIONS: [(i64, i64); 8] = [
    (1, 0),   // East
    (1, 1),   // Southeast
    (0, 1),   // South
    (-1, 1),  // Southwest
    (-1, 0),  // West
    (-1, -1), // Northwest
    (0, -1),  // North
    (1, -1),  // Northeast
];

/// Octile distance between two cells (admissible for 8-way movement at
/// minimum cell cost 1).
#[inline]
fn octile_heuristic(x1: u32, y1: u32, x2: u32, y2: u32) -> f64 {
    let dx = f64::from(x1.abs_diff(x2));
    let dy = f64::from(y1.abs_diff(y2));
    dx.max(dy) + (std::f64::consts::SQRT_2 - 1.0) * dx.min(dy)
}

#[inline]
fn coords_to_tie_breaker(x: u32, y: u32) -> u64 {
    (u64::from(y) << 32) | u64::from(x)
}

/// Where a search is trying to end up.
enum Goal {
    /// The cell containing an exact point.
    Cell(u32, u32),
    /// Any walkable cell whose centre lies in a ring around a point.
    Ring { center: Vec2, inner: f64, outer: f64 },
}

impl Goal {
    fn reached(&self, grid: &NavGrid, x: u32, y: u32) -> bool {
        match *self {
            Self::Cell(gx, gy) => x == gx && y == gy,
            Self::Ring {
                center,
                inner,
                outer,
            } => {
                let d = grid.grid_to_world(x, y).distance(center);
                d >= inner && d <= outer
            }
        }
    }

    fn heuristic(&self, grid: &NavGrid, x: u32, y: u32) -> f64 {
        match *self {
            Self::Cell(gx, gy) => octile_heuristic(x, y, gx, gy),
            Self::Ring { center, outer, .. } => {
                let d = grid.grid_to_world(x, y).distance(center);
                ((d - outer) / grid.cell_size).max(0.0)
            }
        }
    }
}

/// Find a path for `mover` from `from` to `to` on a map of `map_size`.
///
/// With `approach_target`, the path instead ends at the nearest reachable
/// cell adjacent to that entity (centre between the unit separation and the
/// engagement range from it), and `to` is ignored.
///
/// Returns `None` when either end lies off the map, the goal is blocked, or
/// no route exists. The first waypoint is always exactly `from`.
#[must_use]
pub fn find_path(
    world: &EntityStorage,
    mover: EntityId,
    from: Vec2,
    to: Vec2,
    map_size: (f64, f64),
    approach_target: Option<EntityId>,
    config: &RulesConfig,
) -> Option<Vec<Vec2>> {
    let grid = NavGrid::from_world(world, mover, map_size, config);
    let (start_x, start_y) = grid.world_to_grid(from)?;

    let goal = match approach_target {
        Some(target) => {
            let center = world.get(target)?.position?.value;
            Goal::Ring {
                center,
                inner: config.unit_separation,
                outer: config.engagement_range.max(config.unit_separation + grid.cell_size),
            }
        }
        None => {
            let (gx, gy) = grid.world_to_grid(to)?;
            if !grid.is_walkable(gx, gy) {
                return None;
            }
            Goal::Cell(gx, gy)
        }
    };

    let cells = search(&grid, (start_x, start_y), &goal)?;
    let mut path: Vec<Vec2> = cells
        .iter()
        .map(|&(x, y)| grid.grid_to_world(x, y))
        .collect();
    path[0] = from;
    match goal {
        Goal::Cell(..) => {
            if path.len() == 1 {
                path.push(to);
            } else if let Some(last) = path.last_mut() {
                *last = to;
            }
        }
        Goal::Ring { .. } => {
            if path.len() == 1 {
                // already adjacent
                path.push(from);
            }
        }
    }

    let path = smooth_path(&grid, path);
    trace!(mover, waypoints = path.len(), "path found");
    Some(path)
}

/// A* over grid cells. Returns the visited cell sequence, start first.
fn search(grid: &NavGrid, start: (u32, u32), goal: &Goal) -> Option<Vec<(u32, u32)>> {
    let mut open_set: BinaryHeap<AStarNode> = BinaryHeap::new();
    let mut came_from: HashMap<(u32, u32), (u32, u32)> = HashMap::new();
    let mut g_score: HashMap<(u32, u32), f64> = HashMap::new();

    g_score.insert(start, 0.0);
    open_set.push(AStarNode {
        x: start.0,
        y: start.1,
        f_score: OrderedFloat(goal.heuristic(grid, start.0, start.1)),
        tie_breaker: coords_to_tie_breaker(start.0, start.1),
    });

    while let Some(current) = open_set.pop() {
        if goal.reached(grid, current.x, current.y)
            && (grid.is_walkable(current.x, current.y) || (current.x, current.y) == start)
        {
            return Some(reconstruct_path(&came_from, (current.x, current.y)));
        }

        let current_g = g_score
            .get(&(current.x, current.y))
            .copied()
            .unwrap_or(f64::INFINITY);

        for &(dx, dy) in &DIRECTIONS {
            let nx = i64::from(current.x) + dx;
            let ny = i64::from(current.y) + dy;
            if nx < 0 || ny < 0 {
                continue;
            }
            let (nx, ny) = (nx as u32, ny as u32);

            let Some(cell_cost) = grid.movement_cost(nx, ny) else {
                continue;
            };

            // no corner cutting
            if dx != 0
                && dy != 0
                && !(grid.is_walkable_signed(i64::from(current.x) + dx, i64::from(current.y))
                    && grid.is_walkable_signed(i64::from(current.x), i64::from(current.y) + dy))
            {
                continue;
            }

            let step = if dx != 0 && dy != 0 {
                std::f64::consts::SQRT_2
            } else {
                1.0
            };
            let tentative_g = current_g + step * cell_cost;
            let neighbor_g = g_score.get(&(nx, ny)).copied().unwrap_or(f64::INFINITY);

            if tentative_g < neighbor_g {
                came_from.insert((nx, ny), (current.x, current.y));
                g_score.insert((nx, ny), tentative_g);
                open_set.push(AStarNode {
                    x: nx,
                    y: ny,
                    f_score: OrderedFloat(tentative_g + goal.heuristic(grid, nx, ny)),
                    tie_breaker: coords_to_tie_breaker(nx, ny),
                });
            }
        }
    }

    None
}

fn reconstruct_path(
    came_from: &HashMap<(u32, u32), (u32, u32)>,
    goal: (u32, u32),
) -> Vec<(u32, u32)> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

/// Remove waypoints that can be skipped without leaving walkable cells.
#[must_use]
pub fn smooth_path(grid: &NavGrid, path: Vec<Vec2>) -> Vec<Vec2> {
    if path.len() <= 2 {
        return path;
    }

    let mut smoothed = Vec::with_capacity(path.len());
    smoothed.push(path[0]);

    let mut current_idx = 0;
    while current_idx < path.len() - 1 {
        let mut furthest_visible = current_idx + 1;
        for check_idx in (current_idx + 2)..path.len() {
            if has_line_of_sight(grid, path[current_idx], path[check_idx]) {
                furthest_visible = check_idx;
            }
        }
        smoothed.push(path[furthest_visible]);
        current_idx = furthest_visible;
    }

    smoothed
}

/// Bresenham walk through grid cells, refusing corner cuts.
fn has_line_of_sight(grid: &NavGrid, start: Vec2, end: Vec2) -> bool {
    let Some((x0, y0)) = grid.world_to_grid(start) else {
        return false;
    };
    let Some((x1, y1)) = grid.world_to_grid(end) else {
        return false;
    };

    let (x1, y1) = (i64::from(x1), i64::from(y1));
    let mut x = i64::from(x0);
    let mut y = i64::from(y0);
    let dx = (x1 - x).abs();
    let dy = (y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx - dy;

    loop {
        // the start cell may be the mover's own unblocked cell
        if !(grid.is_walkable_signed(x, y) || (x == i64::from(x0) && y == i64::from(y0))) {
            return false;
        }
        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;
        if e2 > -dy && e2 < dx && !(grid.is_walkable_signed(x + sx, y) && grid.is_walkable_signed(x, y + sy)) {
            return false;
        }
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
    }

    true
}

/// Sum of segment lengths.
#[must_use]
pub fn path_length(path: &[Vec2]) -> f64 {
    path.windows(2).map(|w| w[0].distance(w[1])).sum()
}

/// Point `distance` along the path, clamped to its end. `None` for an
/// empty path.
#[must_use]
pub fn position_along_path(path: &[Vec2], distance: f64) -> Option<Vec2> {
    let first = *path.first()?;
    if distance <= 0.0 {
        return Some(first);
    }
    let mut remaining = distance;
    for w in path.windows(2) {
        let segment = w[0].distance(w[1]);
        if remaining <= segment {
            if segment <= f64::EPSILON {
                return Some(w[1]);
            }
            return Some(w[0].lerp(w[1], remaining / segment));
        }
        remaining -= segment;
    }
    path.last().copied()
}

/// Prefix of the path no longer than `max_distance`, ending exactly at the
/// cut point.
#[must_use]
pub fn trim_path(path: &[Vec2], max_distance: f64) -> Vec<Vec2> {
    let Some(&first) = path.first() else {
        return Vec::new();
    };
    let mut trimmed = vec![first];
    let mut remaining = max_distance.max(0.0);
    for w in path.windows(2) {
        let segment = w[0].distance(w[1]);
        if segment <= remaining {
            trimmed.push(w[1]);
            remaining -= segment;
        } else {
            if remaining > 0.0 && segment > f64::EPSILON {
                trimmed.push(w[0].lerp(w[1], remaining / segment));
            }
            break;
        }
    }
    trimmed
}
