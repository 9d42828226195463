use vt_core::{ImageView, Point2f};

// Neighbour offsets, counterclockwise on screen starting east (y grows down).
const DX: [i32; 8] = [1, 1, 0, -1, -1, -1, 0, 1];
const DY: [i32; 8] = [0, -1, -1, -1, 0, 1, 1, 1];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrievalMode {
    /// Outermost borders only.
    #[default]
    External,
    /// Every border, flat (no parents).
    List,
    /// Every border with its full nesting.
    Tree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApproxMode {
    /// Every border pixel.
    None,
    /// Only the end points of straight (axis or diagonal) runs.
    #[default]
    Simple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl PixelPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn to_point2f(self) -> Point2f {
        Point2f::new(self.x as f32, self.y as f32)
    }
}

/// Closed border chain through pixel centres.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    pub points: Vec<PixelPoint>,
    /// `true` for the inner border of a hole.
    pub is_hole: bool,
    /// Index of the enclosing contour in the same result list.
    pub parent: Option<usize>,
}

impl Contour {
    pub fn translated(&self, dx: i32, dy: i32) -> Self {
        Self {
            points: self
                .points
                .iter()
                .map(|p| PixelPoint::new(p.x + dx, p.y + dy))
                .collect(),
            ..self.clone()
        }
    }

    pub fn to_points2f(&self) -> Vec<Point2f> {
        self.points.iter().map(|p| p.to_point2f()).collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct BorderInfo {
    is_hole: bool,
    parent: i32,
}

/// Suzuki-Abe border following over a binary mask (any non-zero pixel is
/// foreground), 8-connected foreground.
///
/// Contours come back in raster discovery order.
pub fn find_contours(
    mask: &ImageView<'_, u8>,
    mode: RetrievalMode,
    approx: ApproxMode,
) -> Vec<Contour> {
    let (w, h) = (mask.width(), mask.height());
    if w == 0 || h == 0 {
        return Vec::new();
    }

    // One pixel of zero padding on every side.
    let pw = w + 2;
    let ph = h + 2;
    let mut f = vec![0_i32; pw * ph];
    for y in 0..h {
        for (x, &v) in mask.row(y).iter().enumerate() {
            if v != 0 {
                f[(y + 1) * pw + x + 1] = 1;
            }
        }
    }

    // Index 1 is the frame, treated as a hole border with no parent.
    let mut borders = vec![
        BorderInfo {
            is_hole: true,
            parent: 0,
        };
        2
    ];
    let mut chains: Vec<Vec<PixelPoint>> = Vec::new();
    let mut nbd = 1_i32;

    for i in 1..ph - 1 {
        let mut lnbd = 1_i32;
        for j in 1..pw - 1 {
            let idx = i * pw + j;
            let v = f[idx];
            if v == 0 {
                continue;
            }

            let start_dir = if v == 1 && f[idx - 1] == 0 {
                Some((4_usize, false))
            } else if v >= 1 && f[idx + 1] == 0 {
                if v > 1 {
                    lnbd = v;
                }
                Some((0_usize, true))
            } else {
                None
            };

            if let Some((from_dir, is_hole)) = start_dir {
                nbd += 1;
                let prev = borders[lnbd as usize];
                let parent = if prev.is_hole == is_hole {
                    prev.parent
                } else {
                    lnbd
                };
                borders.push(BorderInfo { is_hole, parent });

                let chain = follow_border(&mut f, pw, (j as i32, i as i32), from_dir, nbd);
                chains.push(chain);
            }

            let v = f[idx];
            if v != 0 && v != 1 {
                lnbd = v.abs();
            }
        }
    }

    let all = chains
        .into_iter()
        .enumerate()
        .map(|(k, chain)| {
            let info = borders[k + 2];
            let points = match approx {
                ApproxMode::None => chain,
                ApproxMode::Simple => compress_chain(chain),
            };
            Contour {
                points,
                is_hole: info.is_hole,
                parent: (info.parent >= 2).then(|| (info.parent - 2) as usize),
            }
        })
        .collect::<Vec<_>>();

    match mode {
        RetrievalMode::Tree => all,
        RetrievalMode::List => all
            .into_iter()
            .map(|c| Contour { parent: None, ..c })
            .collect(),
        RetrievalMode::External => all
            .into_iter()
            .filter(|c| !c.is_hole && c.parent.is_none())
            .collect(),
    }
}

fn direction_to(from: (i32, i32), to: (i32, i32)) -> usize {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    (0..8)
        .find(|&d| DX[d] == dx && DY[d] == dy)
        .unwrap_or(0)
}

fn follow_border(
    f: &mut [i32],
    pw: usize,
    start: (i32, i32),
    from_dir: usize,
    nbd: i32,
) -> Vec<PixelPoint> {
    let at = |p: (i32, i32)| p.1 as usize * pw + p.0 as usize;
    let neighbour = |p: (i32, i32), d: usize| (p.0 + DX[d], p.1 + DY[d]);
    let unpad = |p: (i32, i32)| PixelPoint::new(p.0 - 1, p.1 - 1);

    // Clockwise scan for the first non-zero neighbour.
    let first = (0..8)
        .map(|k| (from_dir + 8 - k) % 8)
        .map(|d| neighbour(start, d))
        .find(|&q| f[at(q)] != 0);

    let Some(p1) = first else {
        f[at(start)] = -nbd;
        return vec![unpad(start)];
    };

    let mut chain = Vec::new();
    let mut p2 = p1;
    let mut p3 = start;
    loop {
        chain.push(unpad(p3));

        let back = direction_to(p3, p2);
        let mut east_zero = false;
        let mut p4 = p2;
        for k in 1..=8 {
            let d = (back + k) % 8;
            let q = neighbour(p3, d);
            if f[at(q)] != 0 {
                p4 = q;
                break;
            }
            if d == 0 {
                east_zero = true;
            }
        }

        let cur = at(p3);
        if east_zero {
            f[cur] = -nbd;
        } else if f[cur] == 1 {
            f[cur] = nbd;
        }

        if p4 == start && p3 == p1 {
            break;
        }
        p2 = p3;
        p3 = p4;
    }
    chain
}

/// Drops every point whose incoming and outgoing steps share a direction.
fn compress_chain(chain: Vec<PixelPoint>) -> Vec<PixelPoint> {
    let n = chain.len();
    if n <= 2 {
        return chain;
    }
    let step = |a: PixelPoint, b: PixelPoint| ((b.x - a.x).signum(), (b.y - a.y).signum());
    let kept: Vec<PixelPoint> = (0..n)
        .filter(|&k| {
            let prev = chain[(k + n - 1) % n];
            let next = chain[(k + 1) % n];
            step(prev, chain[k]) != step(chain[k], next)
        })
        .map(|k| chain[k])
        .collect();
    if kept.is_empty() { chain } else { kept }
}
