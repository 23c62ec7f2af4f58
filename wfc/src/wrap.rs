use coord_2d::{Coord, Size};

/// Boundary policy of the output grid.
///
/// A neighbour that falls outside the grid along an axis that does not wrap
/// does not exist. Along a wrapping axis it is taken from the opposite edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Wrap {
    #[default]
    None,
    X,
    Y,
    XY,
}

fn value_is_valid(value: i32, size: u32) -> bool {
    value >= 0 && (value as u32) < size
}

fn normalize_value(value: i32, size: u32) -> i32 {
    let value = value % size as i32;
    if value < 0 {
        value + size as i32
    } else {
        value
    }
}

impl Wrap {
    /// `Wrap::XY` when periodic, `Wrap::None` otherwise.
    pub fn periodic(periodic: bool) -> Self {
        if periodic {
            Wrap::XY
        } else {
            Wrap::None
        }
    }

    pub fn is_periodic(self) -> bool {
        self != Wrap::None
    }

    pub fn normalize_coord(self, coord: Coord, size: Size) -> Option<Coord> {
        match self {
            Wrap::None => {
                if coord.is_valid(size) {
                    Some(coord)
                } else {
                    None
                }
            }
            Wrap::X => {
                if value_is_valid(coord.y, size.y()) {
                    Some(Coord::new(normalize_value(coord.x, size.x()), coord.y))
                } else {
                    None
                }
            }
            Wrap::Y => {
                if value_is_valid(coord.x, size.x()) {
                    Some(Coord::new(coord.x, normalize_value(coord.y, size.y())))
                } else {
                    None
                }
            }
            Wrap::XY => Some(Coord::new(
                normalize_value(coord.x, size.x()),
                normalize_value(coord.y, size.y()),
            )),
        }
    }
}
