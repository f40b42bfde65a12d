use std::fmt;
use std::str::FromStr;

/// Where in the column a structure is anchored.
///
/// Written in configuration as `top`, `ocean_floor`, an absolute Y (`64`),
/// an offset from the top block (`@+3`), or a random range of either kind
/// (`[10;40]`, `[@-5;@+5]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerticalRule {
    #[default]
    Top,
    OceanFloor,
    Fixed(i32),
    Offset(i32),
    Range { min: i32, max: i32 },
    OffsetRange { min: i32, max: i32 },
}

fn parse_offset(s: &str) -> Option<i32> {
    let rest = s.strip_prefix('@')?;
    if rest.is_empty() {
        return Some(0);
    }
    rest.strip_prefix('+').unwrap_or(rest).parse().ok()
}

impl FromStr for VerticalRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "top" => return Ok(Self::Top),
            "ocean_floor" => return Ok(Self::OceanFloor),
            _ => {}
        }

        if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            let (a, b) = inner
                .split_once(';')
                .ok_or_else(|| format!("range `{s}` needs two bounds separated by `;`"))?;
            let (a, b) = (a.trim(), b.trim());
            return match (parse_offset(a), parse_offset(b)) {
                (Some(a), Some(b)) => Ok(Self::OffsetRange { min: a.min(b), max: a.max(b) }),
                (None, None) => {
                    let a: i32 = a.parse().map_err(|_| format!("bad range bound `{a}`"))?;
                    let b: i32 = b.parse().map_err(|_| format!("bad range bound `{b}`"))?;
                    Ok(Self::Range { min: a.min(b), max: a.max(b) })
                }
                _ => Err(format!("range `{s}` mixes absolute and relative bounds")),
            };
        }

        if s.starts_with('@') {
            return parse_offset(&s).map(Self::Offset).ok_or_else(|| format!("bad offset `{s}`"));
        }

        s.parse().map(Self::Fixed).map_err(|_| format!("unknown vertical rule `{s}`"))
    }
}

impl fmt::Display for VerticalRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top => write!(f, "top"),
            Self::OceanFloor => write!(f, "ocean_floor"),
            Self::Fixed(y) => write!(f, "{y}"),
            Self::Offset(dy) => write!(f, "@{dy:+}"),
            Self::Range { min, max } => write!(f, "[{min};{max}]"),
            Self::OffsetRange { min, max } => write!(f, "[@{min:+};@{max:+}]"),
        }
    }
}
