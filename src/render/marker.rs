use std::f64::consts::PI;

/// Audiometric marker symbols.  All are drawn as outlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerShape {
    Circle,
    XCross,
    Plus,
    Square,
    Diamond,
    TriangleUp,
    Star,
    Octagon,
    /// `<` with its tip on the data point.
    CaretLeft,
    /// `>` with its tip on the data point.
    CaretRight,
    /// Three spokes, one pointing left.
    TriLeft,
    /// Three spokes, one pointing right.
    TriRight,
    /// `[`
    BracketLeft,
    /// `]`
    BracketRight,
    /// `-[`
    BracketLeftTail,
    /// `]-`
    BracketRightTail,
}

type UnitPath = Vec<(f64, f64)>;

fn closed(mut path: UnitPath) -> UnitPath {
    if let Some(&first) = path.first() {
        path.push(first);
    }
    path
}

fn regular_polygon(vertices: usize, radius: f64, rotation: f64) -> UnitPath {
    closed(
        (0..vertices)
            .map(|i| {
                let theta = rotation + 2.0 * PI * i as f64 / vertices as f64;
                (radius * theta.cos(), radius * theta.sin())
            })
            .collect(),
    )
}

fn spokes(angles_deg: [f64; 3]) -> Vec<UnitPath> {
    angles_deg
        .iter()
        .map(|deg| {
            let theta = deg.to_radians();
            vec![(0.0, 0.0), (theta.cos(), theta.sin())]
        })
        .collect()
}

fn bracket(facing_right: bool, tail: bool) -> Vec<UnitPath> {
    // `]` has its spine on the right and serifs pointing left.
    let dir = if facing_right { 1.0 } else { -1.0 };
    let spine = 0.3 * dir;
    let serif = -0.3 * dir;
    let mut paths = vec![vec![(serif, 1.0), (spine, 1.0), (spine, -1.0), (serif, -1.0)]];
    if tail {
        paths.push(vec![(spine, 0.0), (dir, 0.0)]);
    }
    paths
}

impl MarkerShape {
    /// Outline polylines in unit coordinates (y up, extent about ±1).
    fn unit_paths(self) -> Vec<UnitPath> {
        match self {
            MarkerShape::Circle => vec![regular_polygon(48, 1.0, 0.0)],
            MarkerShape::Octagon => vec![regular_polygon(8, 1.0, PI / 8.0)],
            MarkerShape::Square => vec![closed(vec![(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)])],
            MarkerShape::Diamond => vec![regular_polygon(4, 0.9, PI / 2.0)],
            MarkerShape::TriangleUp => vec![closed(vec![(0.0, 1.0), (-1.0, -1.0), (1.0, -1.0)])],
            MarkerShape::Star => {
                let inner = 0.381966;
                vec![closed(
                    (0..10)
                        .map(|i| {
                            let r = if i % 2 == 0 { 1.0 } else { inner };
                            let theta = PI / 2.0 + PI * i as f64 / 5.0;
                            (r * theta.cos(), r * theta.sin())
                        })
                        .collect(),
                )]
            }
            MarkerShape::XCross => vec![vec![(-1.0, -1.0), (1.0, 1.0)], vec![(-1.0, 1.0), (1.0, -1.0)]],
            MarkerShape::Plus => vec![vec![(-1.0, 0.0), (1.0, 0.0)], vec![(0.0, -1.0), (0.0, 1.0)]],
            MarkerShape::CaretRight => vec![closed(vec![(0.0, 0.0), (-1.5, 1.0), (-1.5, -1.0)])],
            MarkerShape::CaretLeft => vec![closed(vec![(0.0, 0.0), (1.5, 1.0), (1.5, -1.0)])],
            MarkerShape::TriRight => spokes([0.0, 120.0, 240.0]),
            MarkerShape::TriLeft => spokes([180.0, 60.0, 300.0]),
            MarkerShape::BracketRight => bracket(true, false),
            MarkerShape::BracketLeft => bracket(false, false),
            MarkerShape::BracketRightTail => bracket(true, true),
            MarkerShape::BracketLeftTail => bracket(false, true),
        }
    }

    /// Pixel polylines for a marker centred on `center` with half-size `radius`.
    pub fn pixel_paths(self, center: (i32, i32), radius: f64) -> Vec<Vec<(i32, i32)>> {
        let (cx, cy) = center;
        self.unit_paths()
            .into_iter()
            .map(|path| {
                path.into_iter()
                    .map(|(x, y)| {
                        (
                            cx + (x * radius).round() as i32,
                            cy - (y * radius).round() as i32,
                        )
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_outlines_end_where_they_start() {
        for shape in [MarkerShape::Circle, MarkerShape::Square, MarkerShape::Star, MarkerShape::CaretLeft] {
            let paths = shape.pixel_paths((100, 100), 20.0);
            let outline = &paths[0];
            assert_eq!(outline.first(), outline.last(), "{shape:?}");
        }
    }

    #[test]
    fn caret_tip_sits_on_the_point() {
        let paths = MarkerShape::CaretRight.pixel_paths((50, 60), 10.0);
        assert_eq!(paths[0][0], (50, 60));
        assert!(paths[0].iter().all(|&(x, _)| x <= 50));
    }

    #[test]
    fn bracket_tails_point_away_from_the_spine() {
        let right = MarkerShape::BracketRightTail.pixel_paths((0, 0), 10.0);
        let left = MarkerShape::BracketLeftTail.pixel_paths((0, 0), 10.0);
        assert_eq!(right.len(), 2);
        assert_eq!(right[1][1], (10, 0));
        assert_eq!(left[1][1], (-10, 0));
    }

    #[test]
    fn y_axis_is_flipped_to_pixels() {
        let paths = MarkerShape::TriangleUp.pixel_paths((0, 0), 10.0);
        // Apex is above the centre, i.e. at a smaller pixel row.
        assert_eq!(paths[0][0], (0, -10));
    }
}
