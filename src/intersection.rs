use geo::{CoordNum, Rect};

use crate::errors::{DeltasatError, Result};

pub trait Intersection {
    type Output;
    fn intersection(&self, rhs: &Self) -> Result<Self::Output>;
}

impl<T: CoordNum> Intersection for Rect<T> {
    type Output = Rect<T>;
    /// Fails unless the overlap has a positive area.
    fn intersection(&self, rhs: &Self) -> Result<Rect<T>> {
        let lhs_max = self.max();
        let rhs_min = rhs.min();
        if (lhs_max.x <= rhs_min.x) | (lhs_max.y <= rhs_min.y) {
            return Err(DeltasatError::EmptyResult);
        }

        let lhs_min = self.min();
        let rhs_max = rhs.max();
        if (lhs_min.x >= rhs_max.x) | (lhs_min.y >= rhs_max.y) {
            return Err(DeltasatError::EmptyResult);
        }

        let pick = |x: T, y: T, larger: bool| if (x > y) == larger { x } else { y };
        let min = (pick(lhs_min.x, rhs_min.x, true), pick(lhs_min.y, rhs_min.y, true));
        let max = (pick(lhs_max.x, rhs_max.x, false), pick(lhs_max.y, rhs_max.y, false));

        Ok(Self::new(min, max))
    }
}
