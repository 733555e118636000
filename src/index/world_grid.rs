//! Fixed global 5°×5° grid used to organize tiles into folders.

/// Cell edge length in degrees.
pub const CELL_SIZE_DEG: i32 = 5;

/// World extent covered by the grid: full WGS84 longitude/latitude range.
pub const WORLD_BOUNDS: [f64; 4] = [-180.0, -90.0, 180.0, 90.0];

/// One 5°×5° cell of the global partition.
///
/// Bounds are integer degrees; cells are created once per run and never
/// mutated or persisted on their own (only merged rows are persisted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    pub west: i32,
    pub south: i32,
    pub east: i32,
    pub north: i32,
}

impl GridCell {
    /// Folder name encoding the integer bounds as `grid_{w}_{s}_{e}_{n}`.
    pub fn folder_name(&self) -> String {
        format!("grid_{}_{}_{}_{}", self.west, self.south, self.east, self.north)
    }

    /// Bounds as `[min_lon, min_lat, max_lon, max_lat]`.
    pub fn bounds(&self) -> [f64; 4] {
        [
            self.west as f64,
            self.south as f64,
            self.east as f64,
            self.north as f64,
        ]
    }

    /// Closed 5-vertex exterior ring, counter-clockwise from the southwest corner.
    pub fn ring(&self) -> [[f64; 2]; 5] {
        let [w, s, e, n] = self.bounds();
        [[w, s], [e, s], [e, n], [w, n], [w, s]]
    }

    /// Whether a point falls inside the cell (west/south edges inclusive).
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        let [w, s, e, n] = self.bounds();
        lon >= w && lon < e && lat >= s && lat < n
    }
}

/// The full global partition: 72×36 = 2592 disjoint cells.
#[derive(Debug, Clone)]
pub struct WorldGrid {
    cells: Vec<GridCell>,
}

impl WorldGrid {
    /// Build the grid. Pure, deterministic, no I/O; always succeeds.
    ///
    /// Iteration order is west→east in the outer loop and south→north in the
    /// inner loop, which fixes merged-row order downstream.
    pub fn build() -> Self {
        let [min_lon, min_lat, max_lon, max_lat] = WORLD_BOUNDS;

        let mut cells = Vec::with_capacity(72 * 36);
        let mut west = min_lon as i32;
        while west < max_lon as i32 {
            let mut south = min_lat as i32;
            while south < max_lat as i32 {
                cells.push(GridCell {
                    west,
                    south,
                    east: west + CELL_SIZE_DEG,
                    north: south + CELL_SIZE_DEG,
                });
                south += CELL_SIZE_DEG;
            }
            west += CELL_SIZE_DEG;
        }

        WorldGrid { cells }
    }

    /// All cells, in construction order.
    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
