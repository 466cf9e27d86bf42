//! Linear extrapolation of start values between time steps.

/// The last two accepted points of one system.
#[derive(Clone, Debug, Default)]
pub struct History {
    latest: Option<(f64, Vec<f64>)>,
    previous: Option<(f64, Vec<f64>)>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `x` at time `t`. A second point at the same time replaces the
    /// first, so the two stored times always differ.
    pub fn accept(&mut self, t: f64, x: &[f64]) {
        if let Some((t1, x1)) = self.latest.as_mut() {
            if *t1 == t {
                x1.copy_from_slice(x);
                return;
            }
        }
        let recycled = self.previous.take();
        self.previous = self.latest.take();
        let mut values = recycled.map(|(_, v)| v).unwrap_or_default();
        values.clear();
        values.extend_from_slice(x);
        self.latest = Some((t, values));
    }

    pub fn latest(&self) -> Option<(f64, &[f64])> {
        self.latest.as_ref().map(|(t, x)| (*t, x.as_slice()))
    }

    /// Write the prediction for time `t` into `out`.
    ///
    /// `x1 + (x1 - x2) (t - t1) / (t1 - t2)` with two points, `x1` with one.
    /// Returns `false` (leaving `out` untouched) when nothing was accepted.
    pub fn extrapolate(&self, t: f64, out: &mut [f64]) -> bool {
        let Some((t1, x1)) = &self.latest else {
            return false;
        };
        match &self.previous {
            Some((t2, x2)) if t1 != t2 => {
                let w = (t - t1) / (t1 - t2);
                for ((o, a), b) in out.iter_mut().zip(x1).zip(x2) {
                    *o = a + (a - b) * w;
                }
            }
            _ => out.copy_from_slice(x1),
        }
        true
    }
}
