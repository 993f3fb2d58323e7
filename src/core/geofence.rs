use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    #[default]
    TestSite,
    Slbm,
}

/// 具名的高風險地理圍欄，頂點為 (lat, lon)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskZone {
    pub name: String,
    #[serde(default)]
    pub kind: ZoneKind,
    pub vertices: Vec<(f64, f64)>,
}

impl RiskZone {
    pub fn new(name: &str, kind: ZoneKind, vertices: &[(f64, f64)]) -> Self {
        Self {
            name: name.to_string(),
            kind,
            vertices: vertices.to_vec(),
        }
    }

    pub fn is_slbm(&self) -> bool {
        self.kind == ZoneKind::Slbm
    }

    /// Even-odd ray casting on the (lat, lon) plane. Points on an edge are outside.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let n = self.vertices.len();
        if n < 3 || !lat.is_finite() || !lon.is_finite() {
            return false;
        }

        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (yi, xi) = self.vertices[i];
            let (yj, xj) = self.vertices[j];

            if on_segment((yi, xi), (yj, xj), (lat, lon)) {
                return false;
            }

            if (yi > lat) != (yj > lat) {
                let x_cross = xi + (lat - yi) * (xj - xi) / (yj - yi);
                if lon < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }

        inside
    }
}

fn on_segment(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> bool {
    let cross = (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0);
    if cross.abs() > 1e-12 {
        return false;
    }
    p.0 >= a.0.min(b.0) && p.0 <= a.0.max(b.0) && p.1 >= a.1.min(b.1) && p.1 <= a.1.max(b.1)
}

pub fn default_risk_zones() -> Vec<RiskZone> {
    vec![
        RiskZone::new(
            "NK test site",
            ZoneKind::TestSite,
            &[(41.4, 129.0), (41.4, 129.2), (41.2, 129.2), (41.2, 129.0)],
        ),
        RiskZone::new(
            "SLBM test area (Barents Sea)",
            ZoneKind::Slbm,
            &[(72.0, 35.0), (72.0, 40.0), (70.0, 40.0), (70.0, 35.0)],
        ),
        RiskZone::new(
            "SLBM test area (Sea of Japan)",
            ZoneKind::Slbm,
            &[(40.0, 132.0), (40.0, 134.0), (38.0, 134.0), (38.0, 132.0)],
        ),
        RiskZone::new(
            "SLBM test area (Yellow Sea)",
            ZoneKind::Slbm,
            &[(35.0, 123.0), (35.0, 125.0), (33.0, 125.0), (33.0, 123.0)],
        ),
    ]
}

/// 依宣告順序回傳第一個包含該點的區域
pub fn locate<'a>(zones: &'a [RiskZone], lat: f64, lon: f64) -> Option<&'a RiskZone> {
    zones.iter().find(|zone| zone.contains(lat, lon))
}
