use super::types::{AnnotateImageResponse, BoundingPoly};

const WIDTH: usize = 80;

fn rule(c: char) -> String {
    c.to_string().repeat(WIDTH)
}

/// Header rule followed by one line per row, newline-terminated.
fn block(rows: Vec<String>) -> String {
    let mut lines = vec![rule('=')];
    lines.extend(rows);
    lines.join("\n") + "\n"
}

/// Score in `0.0..=1.0` as a whole percent, right-aligned to four columns.
fn percent(score: f32) -> String {
    format!("{:>4}", format!("{:.0}%", f64::from(score) * 100.0))
}

/// Single-quoted literal form of `s`. Switches to double quotes when `s`
/// contains `'` but no `"`. Backslash, the quote, `\n`, `\r` and `\t` are
/// escaped; other control characters become `\xNN` or `\uNNNN`.
fn quoted(s: &str) -> String {
    let q = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(q);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == q => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() && (c as u32) < 0x100 => out.push_str(&format!("\\x{:02x}", c as u32)),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push(q);
    out
}

fn vertices(poly: &BoundingPoly) -> String {
    poly.vertices
        .iter()
        .map(|v| format!("({},{})", v.x, v.y))
        .collect::<Vec<_>>()
        .join(",")
}

fn normalized_vertices(poly: &BoundingPoly) -> String {
    poly.normalized_vertices
        .iter()
        .map(|v| format!("({:.1},{:.1})", v.x, v.y))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn labels(resp: &AnnotateImageResponse) -> String {
    block(
        resp.label_annotations
            .iter()
            .map(|l| format!("{} | {:<5}", percent(l.score), l.description))
            .collect(),
    )
}

pub fn text(resp: &AnnotateImageResponse) -> String {
    block(
        resp.text_annotations
            .iter()
            .map(|a| format!("{:<42} | {}", quoted(&a.description), vertices(&a.bounding_poly)))
            .collect(),
    )
}

/// Landmarks scoring at least `min_score`. A landmark without a location
/// prints `-` for both coordinates.
pub fn landmarks(resp: &AnnotateImageResponse, min_score: f32) -> String {
    block(
        resp.landmark_annotations
            .iter()
            .filter(|l| l.score >= min_score)
            .map(|lm| {
                let (lat, lng) = match lm.locations.first() {
                    Some(loc) => (
                        format!("{:.5}", loc.lat_lng.latitude),
                        format!("{:.5}", loc.lat_lng.longitude),
                    ),
                    None => ("-".to_string(), "-".to_string()),
                };
                format!(
                    "{:<18} | {} | {} | {}",
                    lm.description,
                    vertices(&lm.bounding_poly),
                    lat,
                    lng
                )
            })
            .collect(),
    )
}

pub fn faces(resp: &AnnotateImageResponse) -> String {
    let mut rows = Vec::new();
    for (n, face) in resp.face_annotations.iter().enumerate() {
        rows.push(format!("# Face {} @ {}", n + 1, vertices(&face.bounding_poly)));
        rows.push(format!("Joy:     {}", face.joy_likelihood.name()));
        rows.push(format!("Exposed: {}", face.under_exposed_likelihood.name()));
        rows.push(format!("Blurred: {}", face.blurred_likelihood.name()));
        rows.push(rule('-'));
    }
    block(rows)
}

pub fn objects(resp: &AnnotateImageResponse) -> String {
    block(
        resp.localized_object_annotations
            .iter()
            .map(|obj| {
                format!(
                    "{} | {:<15} | {:<10} | {}",
                    percent(obj.score),
                    obj.name,
                    obj.mid,
                    normalized_vertices(&obj.bounding_poly)
                )
            })
            .collect(),
    )
}

/// Whole response as pretty JSON.
pub fn full(resp: &AnnotateImageResponse) -> String {
    let mut out = serde_json::to_string_pretty(&resp.raw).unwrap_or_default();
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::parse_response;

    fn fixture() -> AnnotateImageResponse {
        let body = std::fs::read_to_string("tests/fixtures/vision_response.json").unwrap();
        parse_response(&body).unwrap()
    }

    fn lines(s: &str) -> Vec<&str> {
        s.lines().collect()
    }

    #[test]
    fn percent_column() {
        assert_eq!(percent(0.93666), " 94%");
        assert_eq!(percent(0.05), "  5%");
        assert_eq!(percent(1.0), "100%");
    }

    #[test]
    fn every_report_starts_with_rule() {
        let r = fixture();
        for out in [labels(&r), text(&r), landmarks(&r, 0.5), faces(&r), objects(&r)] {
            assert_eq!(lines(&out)[0], "=".repeat(80));
        }
    }

    #[test]
    fn label_rows() {
        let out = labels(&fixture());
        let l = lines(&out);
        assert_eq!(l.len(), 4);
        assert_eq!(l[1], " 94% | Bicycle");
        assert_eq!(l[2], " 93% | Tire ");
        assert_eq!(l[3], "  5% | Car  ");
    }

    #[test]
    fn text_rows_quote_and_pad() {
        let out = text(&fixture());
        let l = lines(&out);
        assert_eq!(
            l[1],
            r#"'WAITING?\nPLEASE\nTURN OFF\nYOUR\nENGINE\n' | (341,828),(2249,828),(2249,1993),(341,1993)"#
        );
        assert_eq!(
            l[2],
            "'WAITING'                                  | (352,828),(1150,849),(1146,1011),(0,990)"
        );
    }

    #[test]
    fn landmarks_below_threshold_skipped() {
        let r = fixture();
        let out = landmarks(&r, 0.5);
        let l = lines(&out);
        assert_eq!(l.len(), 2);
        assert_eq!(
            l[1],
            "Eiffel Tower       | (458,76),(821,76),(821,1185),(458,1185) | 48.85846 | 2.29435"
        );

        let all = landmarks(&r, 0.0);
        assert_eq!(lines(&all).len(), 3);
        assert!(lines(&all)[2].ends_with("| - | -"));
    }

    #[test]
    fn face_blocks() {
        let out = faces(&fixture());
        let l = lines(&out);
        assert_eq!(l[1], "# Face 1 @ (1077,157),(2146,157),(2146,1399),(1077,1399)");
        assert_eq!(l[2], "Joy:     VERY_LIKELY");
        assert_eq!(l[3], "Exposed: VERY_UNLIKELY");
        assert_eq!(l[4], "Blurred: VERY_UNLIKELY");
        assert_eq!(l[5], "-".repeat(80));
        assert!(l[6].starts_with("# Face 2 @ "));
        assert_eq!(l[9], "Blurred: UNKNOWN");
        assert_eq!(l.len(), 11);
    }

    #[test]
    fn object_rows() {
        let out = objects(&fixture());
        let l = lines(&out);
        assert_eq!(
            l[1],
            " 90% | Bicycle         | /m/0199g   | (0.3,0.7),(0.6,0.7),(0.6,1.0),(0.3,1.0)"
        );
    }

    #[test]
    fn full_dump_keeps_untyped_keys() {
        let out = full(&fixture());
        assert!(out.contains("imagePropertiesAnnotation"));
        assert!(out.contains("labelAnnotations"));
    }

    #[test]
    fn empty_response_prints_only_rule() {
        let r = AnnotateImageResponse::default();
        assert_eq!(labels(&r), format!("{}\n", "=".repeat(80)));
        assert_eq!(faces(&r), format!("{}\n", "=".repeat(80)));
    }

    #[test]
    fn quoting_rules() {
        assert_eq!(quoted("WAITING"), "'WAITING'");
        assert_eq!(quoted("don't"), r#""don't""#);
        assert_eq!(quoted(r#"it's "x""#), r#"'it\'s "x"'"#);
        assert_eq!(quoted("a\\b\tc\r"), r"'a\\b\tc\r'");
        assert_eq!(quoted("esc\u{1b}"), r"'esc\x1b'");
        assert_eq!(quoted("\u{7f}"), r"'\x7f'");
        assert_eq!(quoted("caf\u{e9}"), "'caf\u{e9}'");
    }
}
