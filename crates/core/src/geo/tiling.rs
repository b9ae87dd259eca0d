//! Splits oversized regions into a grid of smaller tiles.
//!
//! The upstream data source struggles with large extents, so anything above
//! the per-tile area threshold is cut into a grid whose shape follows the
//! aspect ratio of the request.

use super::bbox::{BoundingBox, Tile};

/// Grid shape chosen for a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDimensions {
    pub n_lat: usize,
    pub n_lon: usize,
}

impl GridDimensions {
    pub fn cells(&self) -> usize {
        self.n_lat * self.n_lon
    }
}

/// Splits bounding boxes into tiles no larger than `max_tile_area` deg².
#[derive(Debug, Clone, Copy)]
pub struct TilePartitioner {
    max_tile_area: f64,
}

impl TilePartitioner {
    pub fn new(max_tile_area: f64) -> Self {
        Self { max_tile_area }
    }

    /// Minimum number of tiles needed to cover `bbox`.
    pub fn required_tiles(&self, bbox: &BoundingBox) -> usize {
        (bbox.area_deg2() / self.max_tile_area).ceil() as usize
    }

    /// Partitions `bbox` into row-major tiles covering it exactly.
    ///
    /// Edges are ordered first. Small requests come back as a single tile.
    pub fn partition(&self, bbox: &BoundingBox) -> Vec<Tile> {
        let parent = bbox.normalized();
        let area = parent.area_deg2();
        if area <= self.max_tile_area || !(self.max_tile_area > 0.0) {
            return vec![parent];
        }

        let lat_span = parent.north - parent.south;
        let lon_span = parent.east - parent.west;
        let grid = self.grid_dimensions(lat_span, lon_span, self.required_tiles(&parent));

        let lat_step = lat_span / grid.n_lat as f64;
        let lon_step = lon_span / grid.n_lon as f64;

        let mut tiles = Vec::with_capacity(grid.cells());
        for i in 0..grid.n_lat {
            let south = parent.south + i as f64 * lat_step;
            let north = if i + 1 == grid.n_lat {
                parent.north
            } else {
                (parent.south + (i + 1) as f64 * lat_step).min(parent.north)
            };

            for j in 0..grid.n_lon {
                let west = parent.west + j as f64 * lon_step;
                let east = if j + 1 == grid.n_lon {
                    parent.east
                } else {
                    (parent.west + (j + 1) as f64 * lon_step).min(parent.east)
                };

                tiles.push(BoundingBox::new(south, west, north, east));
            }
        }

        tiles
    }

    /// Picks a grid with at least `num_tiles` cells, shaped after the aspect ratio.
    pub fn grid_dimensions(&self, lat_span: f64, lon_span: f64, num_tiles: usize) -> GridDimensions {
        let aspect = if lat_span > 0.0 {
            lon_span / lat_span
        } else {
            1.0
        };
        let wanted = num_tiles as f64;

        let mut n_lat = ((wanted / aspect).sqrt().round() as usize).max(1);
        let mut n_lon = ((wanted * aspect).sqrt().round() as usize).max(1);

        while n_lat * n_lon < num_tiles {
            if n_lat <= n_lon {
                n_lat += 1;
            } else {
                n_lon += 1;
            }
        }

        GridDimensions { n_lat, n_lon }
    }
}
