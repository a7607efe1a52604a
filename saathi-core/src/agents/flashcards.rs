//! Picture flashcards with inline SVG artwork.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use super::lenient;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    #[serde(default, deserialize_with = "lenient")]
    pub front_image: String,
    #[serde(default, deserialize_with = "lenient")]
    pub back_image: String,
    #[serde(default, deserialize_with = "lenient")]
    pub front_text: String,
    #[serde(default, deserialize_with = "lenient")]
    pub back_text: String,
    #[serde(default, deserialize_with = "lenient")]
    pub image_type: String,
    #[serde(default, deserialize_with = "lenient")]
    pub real_world_example: String,
}

impl Flashcard {
    fn svg(front: String, back: String, front_text: &str, back_text: &str, example: &str) -> Self {
        Self {
            front_image: front,
            back_image: back,
            front_text: front_text.to_string(),
            back_text: back_text.to_string(),
            image_type: "svg".to_string(),
            real_world_example: example.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Circle,
    Triangle,
    Square,
}

pub fn shape_svg(shape: Shape) -> String {
    let body = match shape {
        Shape::Circle => {
            let mut s = String::from(
                r##"<circle cx="100" cy="100" r="80" fill="#ffeb3b" stroke="#ff9800" stroke-width="4"/><g transform="translate(100,100)">"##,
            );
            // Sun rays every 45 degrees.
            for (x, y) in [(0, -1), (1, -1), (1, 0), (1, 1), (0, 1), (-1, 1), (-1, 0), (-1, -1)] {
                let (outer, inner) = if x != 0 && y != 0 { (71, 60) } else { (100, 85) };
                let _ = write!(
                    s,
                    r##"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="#ff9800" stroke-width="3"/>"##,
                    x * outer,
                    y * outer,
                    x * inner,
                    y * inner
                );
            }
            s.push_str("</g>");
            s
        }
        Shape::Triangle => concat!(
            r##"<polygon points="100,20 30,160 170,160" fill="#4caf50" stroke="#2e7d32" stroke-width="4"/>"##,
            r##"<polygon points="80,140 120,140 100,100" fill="#81c784" stroke="#2e7d32" stroke-width="2"/>"##,
        )
        .to_string(),
        Shape::Square => concat!(
            r##"<rect x="30" y="30" width="140" height="140" fill="#2196f3" stroke="#1565c0" stroke-width="4"/>"##,
            r##"<rect x="60" y="60" width="35" height="35" fill="#64b5f6" stroke="#1565c0" stroke-width="2"/>"##,
            r##"<rect x="105" y="60" width="35" height="35" fill="#64b5f6" stroke="#1565c0" stroke-width="2"/>"##,
            r##"<rect x="60" y="105" width="80" height="30" fill="#64b5f6" stroke="#1565c0" stroke-width="2"/>"##,
        )
        .to_string(),
    };

    format!(
        r#"<svg width="200" height="200" viewBox="0 0 200 200" xmlns="http://www.w3.org/2000/svg">{}</svg>"#,
        body
    )
}

fn apple(out: &mut String, cx: u32, radius: u32) {
    let (stem_y, stem_rx, stem_ry) = if radius > 20 { (55, 3, 8) } else { (60, 2, 6) };
    let _ = write!(
        out,
        r##"<circle cx="{cx}" cy="75" r="{radius}" fill="#ff6b6b" stroke="#333" stroke-width="2"/><ellipse cx="{cx}" cy="{stem_y}" rx="{stem_rx}" ry="{stem_ry}" fill="#4ecdc4"/>"##,
    );
}

/// Apples for `left + right`. With `right == 0` the apples are drawn larger, as a single
/// group (the answer side of a card).
pub fn apples_svg(left: u32, right: u32) -> String {
    let mut body = String::new();
    if right == 0 {
        for i in 0..left {
            apple(&mut body, 50 + i * 40, 25);
        }
    } else {
        for i in 0..left {
            apple(&mut body, 30 + i * 30, 20);
        }
        body.push_str(
            r##"<text x="150" y="85" font-family="Arial" font-size="30" fill="#333" text-anchor="middle">+</text>"##,
        );
        for i in 0..right {
            apple(&mut body, 190 + i * 30, 20);
        }
    }

    format!(
        r#"<svg width="300" height="150" viewBox="0 0 300 150" xmlns="http://www.w3.org/2000/svg">{}</svg>"#,
        body
    )
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn mentions(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Cards chosen from subject and topic keywords (English or Hindi).
pub fn topic_flashcards(subject: &str, topic: &str) -> Vec<Flashcard> {
    let subject = subject.to_lowercase();
    let topic = topic.to_lowercase();

    if mentions(&subject, &["math", "गणित"]) {
        if mentions(&topic, &["shape", "आकार"]) {
            return vec![
                Flashcard::svg(
                    shape_svg(Shape::Circle),
                    shape_svg(Shape::Circle),
                    "Circle",
                    "वृत्त",
                    "Sun, orange, wheel, clock face",
                ),
                Flashcard::svg(
                    shape_svg(Shape::Triangle),
                    shape_svg(Shape::Triangle),
                    "Triangle",
                    "त्रिकोण",
                    "Mountain, samosa, tent, roof",
                ),
                Flashcard::svg(
                    shape_svg(Shape::Square),
                    shape_svg(Shape::Square),
                    "Square",
                    "वर्ग",
                    "House window, book, tile, box",
                ),
            ];
        }
        if mentions(&topic, &["add", "जोड़"]) {
            return vec![
                Flashcard::svg(apples_svg(2, 3), apples_svg(5, 0), "2 + 3", "5", "Count and add real fruits"),
                Flashcard::svg(apples_svg(1, 4), apples_svg(5, 0), "1 + 4", "5", "Use real objects to count"),
            ];
        }
    }

    if mentions(&subject, &["science", "विज्ञान"]) && mentions(&topic, &["plant", "पौधे"]) {
        return vec![Flashcard::svg(
            "<svg>Plant stem and leaves</svg>".to_string(),
            "<svg>Plant parts labeled</svg>".to_string(),
            "Plant",
            "पौधा",
            "Real plants in garden or pots",
        )];
    }

    vec![Flashcard::svg(
        format!("<svg>Visual for {}</svg>", topic),
        format!("<svg>Answer for {}</svg>", topic),
        &title_case(&topic),
        &format!("Demo content for {}", topic),
        &format!("Real world examples of {}", topic),
    )]
}

/// Topics that get generated artwork attached to live flashcard output.
pub fn is_visual_topic(topic: &str) -> bool {
    mentions(&topic.to_lowercase(), &["shape", "number", "math", "गणित"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_cards_for_maths() {
        let cards = topic_flashcards("Mathematics", "Basic Shapes");
        let names: Vec<_> = cards.iter().map(|c| c.front_text.as_str()).collect();
        assert_eq!(names, vec!["Circle", "Triangle", "Square"]);
        assert!(cards.iter().all(|c| c.front_image.starts_with("<svg") && c.image_type == "svg"));
        assert!(cards[0].front_image.contains("<circle"));
    }

    #[test]
    fn test_hindi_keywords_match() {
        let cards = topic_flashcards("गणित", "जोड़");
        assert_eq!(cards[0].front_text, "2 + 3");
        assert_eq!(cards[0].back_text, "5");
    }

    #[test]
    fn test_apples_svg_counts() {
        let svg = apples_svg(2, 3);
        assert_eq!(svg.matches("<circle").count(), 5);
        assert!(svg.contains(">+</text>"));

        let answer = apples_svg(5, 0);
        assert_eq!(answer.matches("r=\"25\"").count(), 5);
        assert!(!answer.contains("<text"));
    }

    #[test]
    fn test_sun_has_eight_rays() {
        assert_eq!(shape_svg(Shape::Circle).matches("<line").count(), 8);
    }

    #[test]
    fn test_generic_card_for_other_topics() {
        let cards = topic_flashcards("Social Studies", "indian rivers");
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].front_text, "Indian Rivers");
        assert_eq!(cards[0].back_text, "Demo content for indian rivers");
    }

    #[test]
    fn test_plant_card() {
        let cards = topic_flashcards("Science", "Parts of a Plant");
        assert_eq!(cards[0].back_text, "पौधा");
    }

    #[test]
    fn test_visual_topics() {
        assert!(is_visual_topic("Shapes around us"));
        assert!(is_visual_topic("Numbers 1-10"));
        assert!(!is_visual_topic("Festivals"));
    }
}
