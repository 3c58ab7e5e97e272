//! Viewport fitting - terminal geometry from container pixels and font metrics

pub const MIN_COLS: u16 = 20;
pub const MIN_ROWS: u16 = 6;
pub const DEFAULT_COLS: u16 = 80;
pub const DEFAULT_ROWS: u16 = 24;

/// Terminal size in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    pub cols: u16,
    pub rows: u16,
}

impl Geometry {
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Clamp to the minimum size a client reports
    pub fn clamped(self) -> Self {
        Self {
            cols: self.cols.max(MIN_COLS),
            rows: self.rows.max(MIN_ROWS),
        }
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new(DEFAULT_COLS, DEFAULT_ROWS)
    }
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

/// Fit a container into cells. Degenerate metrics give the minimum size.
pub fn fit(container_width: f64, container_height: f64, cell_width: f64, cell_height: f64) -> Geometry {
    Geometry::new(
        cells(container_width, cell_width),
        cells(container_height, cell_height),
    )
    .clamped()
}

fn cells(extent: f64, cell: f64) -> u16 {
    if !extent.is_finite() || !cell.is_finite() || extent <= 0.0 || cell <= 0.0 {
        return 0;
    }
    let n = (extent / cell).floor();
    if n >= f64::from(u16::MAX) {
        u16::MAX
    } else {
        n as u16
    }
}

/// Tracks the last reported geometry so resize notifications fire only on change
#[derive(Debug, Clone, Default)]
pub struct ViewportFitter {
    last: Option<Geometry>,
}

impl ViewportFitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<Geometry> {
        self.last
    }

    /// Fit from pixel metrics; `Some` when a resize should be sent
    pub fn observe(
        &mut self,
        container_width: f64,
        container_height: f64,
        cell_width: f64,
        cell_height: f64,
    ) -> Option<Geometry> {
        self.observe_cells(fit(container_width, container_height, cell_width, cell_height))
    }

    /// Same as `observe` for callers that already know the cell counts
    pub fn observe_cells(&mut self, geometry: Geometry) -> Option<Geometry> {
        let geometry = geometry.clamped();
        if self.last == Some(geometry) {
            return None;
        }
        self.last = Some(geometry);
        Some(geometry)
    }

    /// Forget the last geometry, e.g. after reconnecting
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_floors_cells() {
        assert_eq!(fit(1000.0, 500.0, 9.0, 17.0), Geometry::new(111, 29));
    }

    #[test]
    fn test_fit_clamps_minimum() {
        assert_eq!(fit(50.0, 20.0, 9.0, 17.0), Geometry::new(MIN_COLS, MIN_ROWS));
        assert_eq!(fit(0.0, 0.0, 9.0, 17.0), Geometry::new(MIN_COLS, MIN_ROWS));
    }

    #[test]
    fn test_fit_degenerate_metrics() {
        for (w, h, cw, ch) in [
            (800.0, 600.0, 0.0, 17.0),
            (800.0, 600.0, 9.0, -1.0),
            (f64::NAN, 600.0, 9.0, 17.0),
            (800.0, f64::INFINITY, 9.0, 17.0),
        ] {
            let g = fit(w, h, cw, ch);
            assert!(g.cols >= MIN_COLS && g.rows >= MIN_ROWS);
        }
    }

    #[test]
    fn test_observe_dedupes() {
        let mut fitter = ViewportFitter::new();
        assert_eq!(fitter.observe(900.0, 480.0, 9.0, 20.0), Some(Geometry::new(100, 24)));
        assert_eq!(fitter.observe(905.0, 485.0, 9.0, 20.0), None);
        assert_eq!(fitter.observe(450.0, 480.0, 9.0, 20.0), Some(Geometry::new(50, 24)));

        fitter.reset();
        assert_eq!(fitter.observe(450.0, 480.0, 9.0, 20.0), Some(Geometry::new(50, 24)));
    }

    #[test]
    fn test_observe_cells_clamps() {
        let mut fitter = ViewportFitter::new();
        assert_eq!(fitter.observe_cells(Geometry::new(3, 2)), Some(Geometry::new(20, 6)));
    }

    #[test]
    fn test_default_geometry() {
        assert_eq!(Geometry::default(), Geometry::new(80, 24));
        assert_eq!(Geometry::default().to_string(), "80x24");
    }
}
