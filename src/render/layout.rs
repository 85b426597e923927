use plotters::style::RGBColor;

use crate::data::model::{Audiogram, Conduction, EarSide, PointCategory};

use super::marker::MarkerShape;

// ---------------------------------------------------------------------------
// Colour convention
// ---------------------------------------------------------------------------

pub const LEFT_EAR_COLOR: RGBColor = RGBColor(0, 0, 255);
pub const RIGHT_EAR_COLOR: RGBColor = RGBColor(255, 0, 0);
pub const NO_RESPONSE_COLOR: RGBColor = RGBColor(0, 0, 0);

/// Line colour of an ear: left is blue, right is red.
pub fn ear_color(side: EarSide) -> RGBColor {
    match side {
        EarSide::Left => LEFT_EAR_COLOR,
        EarSide::Right => RIGHT_EAR_COLOR,
    }
}

/// Marker colour: black for no-response points, the ear colour otherwise.
pub fn category_color(side: EarSide, category: PointCategory) -> RGBColor {
    if category.is_no_response() {
        NO_RESPONSE_COLOR
    } else {
        ear_color(side)
    }
}

/// Marker shape for every (conduction, ear, category) combination.
pub fn marker_shape(conduction: Conduction, side: EarSide, category: PointCategory) -> MarkerShape {
    use MarkerShape::*;
    use PointCategory::*;

    match (conduction, side, category) {
        (Conduction::Air, EarSide::Left, MaskedResponse) => Square,
        (Conduction::Air, EarSide::Left, MaskedNoResponse) => Diamond,
        (Conduction::Air, EarSide::Left, UnmaskedResponse) => XCross,
        (Conduction::Air, EarSide::Left, UnmaskedNoResponse) => Plus,

        (Conduction::Bone, EarSide::Left, MaskedResponse) => BracketRight,
        (Conduction::Bone, EarSide::Left, MaskedNoResponse) => BracketRightTail,
        (Conduction::Bone, EarSide::Left, UnmaskedResponse) => CaretRight,
        (Conduction::Bone, EarSide::Left, UnmaskedNoResponse) => TriRight,

        (Conduction::Air, EarSide::Right, MaskedResponse) => TriangleUp,
        (Conduction::Air, EarSide::Right, MaskedNoResponse) => Star,
        (Conduction::Air, EarSide::Right, UnmaskedResponse) => Circle,
        (Conduction::Air, EarSide::Right, UnmaskedNoResponse) => Octagon,

        (Conduction::Bone, EarSide::Right, MaskedResponse) => BracketLeft,
        (Conduction::Bone, EarSide::Right, MaskedNoResponse) => BracketLeftTail,
        (Conduction::Bone, EarSide::Right, UnmaskedResponse) => CaretLeft,
        (Conduction::Bone, EarSide::Right, UnmaskedNoResponse) => TriLeft,
    }
}

// ---------------------------------------------------------------------------
// Chart layout – what gets drawn, independent of pixels
// ---------------------------------------------------------------------------

/// The connecting line of one conduction mode.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesLine {
    pub conduction: Conduction,
    pub color: RGBColor,
    /// `(frequency slot, dBHL)` for every measured point.
    pub points: Vec<(usize, i32)>,
}

/// One non-empty marker category of one conduction mode.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerLayer {
    pub conduction: Conduction,
    pub category: PointCategory,
    pub shape: MarkerShape,
    pub color: RGBColor,
    pub label: String,
    pub points: Vec<(usize, i32)>,
}

/// Everything the renderer draws for one ear.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartLayout {
    pub side: EarSide,
    pub title: String,
    pub lines: Vec<SeriesLine>,
    pub layers: Vec<MarkerLayer>,
}

impl ChartLayout {
    /// Partition both conduction series of `side` into marker layers.
    /// Categories without points are left out entirely.
    pub fn new(gram: &Audiogram, side: EarSide) -> Self {
        let mut lines = Vec::new();
        let mut layers = Vec::new();

        for conduction in Conduction::ALL {
            let series = gram.series(conduction, side);
            let n = conduction.point_count().min(series.len());

            lines.push(SeriesLine {
                conduction,
                color: ear_color(side),
                points: series.values[..n]
                    .iter()
                    .enumerate()
                    .map(|(slot, &v)| (slot, v))
                    .collect(),
            });

            for category in PointCategory::ALL {
                let points: Vec<(usize, i32)> = series
                    .points()
                    .take(n)
                    .filter(|&(_, _, c)| c == category)
                    .map(|(slot, v, _)| (slot, v))
                    .collect();
                if points.is_empty() {
                    continue;
                }
                layers.push(MarkerLayer {
                    conduction,
                    category,
                    shape: marker_shape(conduction, side, category),
                    color: category_color(side, category),
                    label: category.legend_label(conduction),
                    points,
                });
            }
        }

        Self {
            side,
            title: format!("{side} Audiogram"),
            lines,
            layers,
        }
    }

    /// Legend labels, in drawing order.
    pub fn legend_labels(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.label.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::ThresholdSeries;

    fn gram_with_right_air(series: ThresholdSeries) -> Audiogram {
        Audiogram {
            ac_left: ThresholdSeries::unflagged(vec![10; 6]),
            ac_right: series,
            bc_left: ThresholdSeries::unflagged(vec![5; 5]),
            bc_right: ThresholdSeries::unflagged(vec![5; 5]),
        }
    }

    #[test]
    fn unflagged_ear_has_one_layer_per_conduction() {
        let gram = gram_with_right_air(ThresholdSeries::unflagged(vec![20, 25, 30, 35, 40, 45]));
        let layout = ChartLayout::new(&gram, EarSide::Right);

        assert_eq!(layout.title, "Right Audiogram");
        assert_eq!(layout.legend_labels(), vec!["AC", "BC"]);
        assert_eq!(layout.layers[0].shape, MarkerShape::Circle);
        assert_eq!(layout.layers[1].shape, MarkerShape::CaretLeft);
        assert!(layout.layers.iter().all(|l| l.color == RIGHT_EAR_COLOR));
    }

    #[test]
    fn no_response_points_are_black_regardless_of_masking() {
        let gram = gram_with_right_air(ThresholdSeries::new(
            vec![20, 25, 30, 35, 120, 120],
            vec![false, false, false, false, true, false],
            vec![false, false, false, false, true, true],
        ));
        let layout = ChartLayout::new(&gram, EarSide::Right);

        let air: Vec<_> = layout
            .layers
            .iter()
            .filter(|l| l.conduction == Conduction::Air)
            .collect();
        assert_eq!(air.len(), 3);

        let masked_noresp = air
            .iter()
            .find(|l| l.category == PointCategory::MaskedNoResponse)
            .unwrap();
        assert_eq!(masked_noresp.points, vec![(4, 120)]);
        assert_eq!(masked_noresp.color, NO_RESPONSE_COLOR);
        assert_eq!(masked_noresp.shape, MarkerShape::Star);

        let unmasked_noresp = air
            .iter()
            .find(|l| l.category == PointCategory::UnmaskedNoResponse)
            .unwrap();
        assert_eq!(unmasked_noresp.points, vec![(5, 120)]);
        assert_eq!(unmasked_noresp.color, NO_RESPONSE_COLOR);
    }

    #[test]
    fn empty_categories_have_no_legend_entry() {
        let gram = gram_with_right_air(ThresholdSeries::new(
            vec![20; 6],
            vec![true; 6],
            vec![false; 6],
        ));
        let layout = ChartLayout::new(&gram, EarSide::Right);
        assert_eq!(layout.legend_labels(), vec!["AC masked", "BC"]);
    }

    #[test]
    fn bone_line_spans_five_points_air_line_six() {
        let gram = gram_with_right_air(ThresholdSeries::unflagged(vec![0; 6]));
        let layout = ChartLayout::new(&gram, EarSide::Left);
        assert_eq!(layout.lines[0].points.len(), 6);
        assert_eq!(layout.lines[1].points.len(), 5);
        assert!(layout.lines.iter().all(|l| l.color == LEFT_EAR_COLOR));
        assert_eq!(layout.layers[0].shape, MarkerShape::XCross);
        assert_eq!(layout.layers[1].shape, MarkerShape::CaretRight);
    }
}
