use image::GrayImage;

use crate::foundation::core::Point;
use crate::foundation::homography::quad_area;

/// Otsu's threshold over a luma histogram.
pub(crate) fn otsu(gray: &[u8]) -> u8 {
    let mut hist = [0u32; 256];
    for &px in gray {
        hist[px as usize] += 1;
    }
    let total = gray.len() as f64;
    let sum: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * f64::from(c))
        .sum();

    let mut sum_b = 0.0;
    let mut w_b = 0.0;
    let mut best = 0.0;
    let mut threshold = 0u8;
    for (i, &count) in hist.iter().enumerate() {
        w_b += f64::from(count);
        if w_b == 0.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f == 0.0 {
            break;
        }
        sum_b += i as f64 * f64::from(count);
        let mu = sum_b / w_b - (sum - sum_b) / w_f;
        let between = w_b * w_f * mu * mu;
        if between > best {
            best = between;
            threshold = i as u8;
        }
    }
    threshold
}

/// A 4-connected region of dark pixels.
#[derive(Debug)]
pub(crate) struct Component {
    pub(crate) pixels: usize,
    /// Outer corners of every boundary pixel, in image coordinates.
    pub(crate) outline: Vec<Point>,
}

/// Label dark (`<= threshold`) regions, skipping ones that touch the image border.
pub(crate) fn dark_components(gray: &GrayImage, threshold: u8, min_pixels: usize) -> Vec<Component> {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let px = gray.as_raw();
    let dark = |i: usize| px[i] <= threshold;

    let mut seen = vec![false; w * h];
    let mut out = Vec::new();
    let mut stack = Vec::new();
    let mut members = Vec::new();

    for start in 0..w * h {
        if seen[start] || !dark(start) {
            continue;
        }
        seen[start] = true;
        stack.push(start);
        members.clear();
        let mut touches_border = false;

        while let Some(i) = stack.pop() {
            members.push(i);
            let (x, y) = (i % w, i / w);
            if x == 0 || y == 0 || x + 1 == w || y + 1 == h {
                touches_border = true;
            }
            let mut visit = |j: usize| {
                if !seen[j] && dark(j) {
                    seen[j] = true;
                    stack.push(j);
                }
            };
            if x > 0 {
                visit(i - 1);
            }
            if x + 1 < w {
                visit(i + 1);
            }
            if y > 0 {
                visit(i - w);
            }
            if y + 1 < h {
                visit(i + w);
            }
        }

        if touches_border || members.len() < min_pixels {
            continue;
        }

        let mut outline = Vec::new();
        for &i in &members {
            let (x, y) = (i % w, i / w);
            let boundary = !dark(i - 1) || !dark(i + 1) || !dark(i - w) || !dark(i + w);
            if boundary {
                let (fx, fy) = (x as f64, y as f64);
                outline.push(Point::new(fx, fy));
                outline.push(Point::new(fx + 1.0, fy));
                outline.push(Point::new(fx, fy + 1.0));
                outline.push(Point::new(fx + 1.0, fy + 1.0));
            }
        }
        out.push(Component {
            pixels: members.len(),
            outline,
        });
    }
    out
}

fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Andrew's monotone chain convex hull.
pub(crate) fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut hull: Vec<Point> = Vec::with_capacity(pts.len() * 2);
    for &p in &pts {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

pub(crate) fn polygon_area(poly: &[Point]) -> f64 {
    let n = poly.len();
    let mut acc = 0.0;
    for i in 0..n {
        let (a, b) = (poly[i], poly[(i + 1) % n]);
        acc += a.x * b.y - b.x * a.y;
    }
    (acc * 0.5).abs()
}

/// Pick four hull points spanning the largest quadrilateral.
///
/// Corners come back clockwise on screen (y down), starting from the one nearest the
/// image's top-left.
pub(crate) fn fit_quad(hull: &[Point]) -> Option<[Point; 4]> {
    if hull.len() < 4 {
        return None;
    }
    let n = hull.len() as f64;
    let centroid = hull
        .iter()
        .fold(Point::ZERO, |acc, p| Point::new(acc.x + p.x / n, acc.y + p.y / n));

    let farthest_from = |q: Point| {
        hull.iter()
            .copied()
            .max_by(|a, b| a.distance_squared(q).total_cmp(&b.distance_squared(q)))
    };
    let a = farthest_from(centroid)?;
    let c = farthest_from(a)?;
    let side = |p: &Point| cross(a, c, *p);
    let b = hull.iter().copied().max_by(|p, q| side(p).total_cmp(&side(q)))?;
    let d = hull.iter().copied().min_by(|p, q| side(p).total_cmp(&side(q)))?;
    if side(&b) <= 0.0 || side(&d) >= 0.0 {
        return None;
    }

    // a, b, c, d go around the hull; make them clockwise on screen.
    let mut quad = [a, b, c, d];
    if cross(quad[0], quad[1], quad[2]) < 0.0 {
        quad.swap(1, 3);
    }
    let start = (0..4)
        .min_by(|&i, &j| {
            (quad[i].x + quad[i].y).total_cmp(&(quad[j].x + quad[j].y))
        })
        .unwrap_or(0);
    quad.rotate_left(start);
    Some(quad)
}

/// `true` when every turn of the quad bends the same way.
pub(crate) fn is_convex(q: &[Point; 4]) -> bool {
    let signs: Vec<f64> = (0..4)
        .map(|i| cross(q[i], q[(i + 1) % 4], q[(i + 2) % 4]))
        .collect();
    signs.iter().all(|&s| s > 0.0) || signs.iter().all(|&s| s < 0.0)
}

pub(crate) fn min_edge(q: &[Point; 4]) -> f64 {
    (0..4)
        .map(|i| q[i].distance(q[(i + 1) % 4]))
        .fold(f64::INFINITY, f64::min)
}

/// Ratio of quad area to hull area, 1.0 for a perfect quadrilateral.
pub(crate) fn hull_fill(q: &[Point; 4], hull: &[Point]) -> f64 {
    let hull_area = polygon_area(hull);
    if hull_area <= 0.0 {
        return 0.0;
    }
    quad_area(q) / hull_area
}

/// Bilinear luma sample at an image-space point (pixel centers at `+0.5`).
pub(crate) fn sample_bilinear(gray: &GrayImage, p: Point) -> f64 {
    let (w, h) = (gray.width() as i64, gray.height() as i64);
    let x = p.x - 0.5;
    let y = p.y - 0.5;
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let at = |xi: i64, yi: i64| {
        let xi = xi.clamp(0, w - 1) as u32;
        let yi = yi.clamp(0, h - 1) as u32;
        f64::from(gray.get_pixel(xi, yi).0[0])
    };
    let (x0, y0) = (x0 as i64, y0 as i64);
    let top = at(x0, y0) * (1.0 - fx) + at(x0 + 1, y0) * fx;
    let bottom = at(x0, y0 + 1) * (1.0 - fx) + at(x0 + 1, y0 + 1) * fx;
    top * (1.0 - fy) + bottom * fy
}

#[cfg(test)]
#[path = "../../tests/unit/marker/quad.rs"]
mod tests;
