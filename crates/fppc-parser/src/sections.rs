//! Section Parser (spec section 4.5.1): detects Question / Conclusion /
//! Facts / Analysis headers across three format eras, plus an OCR-tolerant
//! fallback family, and slices the document-end marker so a quoted
//! valediction embedded in Facts does not truncate the section (B4).

use once_cell::sync::Lazy;
use regex::Regex;

use fppc_core::models::Sections;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Question,
    Conclusion,
    Facts,
    Analysis,
}

impl SectionKind {
    fn as_str(self) -> &'static str {
        match self {
            SectionKind::Question => "question",
            SectionKind::Conclusion => "conclusion",
            SectionKind::Facts => "facts",
            SectionKind::Analysis => "analysis",
        }
    }
}

struct HeaderFamily {
    kind: SectionKind,
    era: &'static str,
    patterns: Vec<Regex>,
}

/// Modern (2000+) headers: a bare word on its own line, optionally followed
/// by a colon.
static MODERN: Lazy<Vec<HeaderFamily>> = Lazy::new(|| {
    vec![
        HeaderFamily {
            kind: SectionKind::Question,
            era: "modern",
            patterns: vec![Regex::new(r"(?im)^\s*QUESTIONS?:?\s*$").unwrap()],
        },
        HeaderFamily {
            kind: SectionKind::Conclusion,
            era: "modern",
            patterns: vec![Regex::new(r"(?im)^\s*CONCLUSIONS?:?\s*$").unwrap()],
        },
        HeaderFamily {
            kind: SectionKind::Facts,
            era: "modern",
            patterns: vec![Regex::new(r"(?im)^\s*FACTS:?\s*$").unwrap()],
        },
        HeaderFamily {
            kind: SectionKind::Analysis,
            era: "modern",
            patterns: vec![Regex::new(r"(?im)^\s*ANALYSIS:?\s*$").unwrap()],
        },
    ]
});

/// Numbered-outline headers: "I. QUESTION", "II. CONCLUSION", etc.
static NUMBERED: Lazy<Vec<HeaderFamily>> = Lazy::new(|| {
    vec![
        HeaderFamily {
            kind: SectionKind::Question,
            era: "numbered",
            patterns: vec![Regex::new(r"(?im)^\s*[IVX]{1,4}\.\s*QUESTIONS?:?\s*$").unwrap()],
        },
        HeaderFamily {
            kind: SectionKind::Conclusion,
            era: "numbered",
            patterns: vec![Regex::new(r"(?im)^\s*[IVX]{1,4}\.\s*CONCLUSIONS?:?\s*$").unwrap()],
        },
        HeaderFamily {
            kind: SectionKind::Facts,
            era: "numbered",
            patterns: vec![Regex::new(r"(?im)^\s*[IVX]{1,4}\.\s*FACTS:?\s*$").unwrap()],
        },
        HeaderFamily {
            kind: SectionKind::Analysis,
            era: "numbered",
            patterns: vec![Regex::new(r"(?im)^\s*[IVX]{1,4}\.\s*(ANALYSIS|DISCUSSION):?\s*$").unwrap()],
        },
    ]
});

/// Older-era variants: "QUESTIONS PRESENTED", "SHORT ANSWER", "DISCUSSION",
/// "BACKGROUND".
static OLDER: Lazy<Vec<HeaderFamily>> = Lazy::new(|| {
    vec![
        HeaderFamily {
            kind: SectionKind::Question,
            era: "older",
            patterns: vec![Regex::new(r"(?im)^\s*QUESTIONS?\s+PRESENTED:?\s*$").unwrap()],
        },
        HeaderFamily {
            kind: SectionKind::Conclusion,
            era: "older",
            patterns: vec![Regex::new(r"(?im)^\s*SHORT\s+ANSWERS?:?\s*$").unwrap()],
        },
        HeaderFamily {
            kind: SectionKind::Facts,
            era: "older",
            patterns: vec![Regex::new(r"(?im)^\s*BACKGROUND:?\s*$").unwrap()],
        },
        HeaderFamily {
            kind: SectionKind::Analysis,
            era: "older",
            patterns: vec![Regex::new(r"(?im)^\s*DISCUSSION:?\s*$").unwrap()],
        },
    ]
});

/// OCR-tolerant family, only consulted when the strict families find nothing
/// at all for a given kind: common character substitutions (0/O, 1/I),
/// inserted spaces, missing colons.
static OCR_TOLERANT: Lazy<Vec<HeaderFamily>> = Lazy::new(|| {
    vec![
        HeaderFamily {
            kind: SectionKind::Question,
            era: "ocr-tolerant",
            patterns: vec![Regex::new(r"(?im)^\s*[QO0]\s*U\s*[EF]\s*S\s*T\s*[I1]\s*[O0]\s*N\s*S?:?\s*$").unwrap()],
        },
        HeaderFamily {
            kind: SectionKind::Conclusion,
            era: "ocr-tolerant",
            patterns: vec![Regex::new(r"(?im)^\s*C\s*[O0]\s*N\s*C\s*L\s*U\s*S\s*[I1]\s*[O0]\s*N\s*S?:?\s*$").unwrap()],
        },
        HeaderFamily {
            kind: SectionKind::Facts,
            era: "ocr-tolerant",
            patterns: vec![Regex::new(r"(?im)^\s*F\s*A\s*C\s*T\s*S:?\s*$").unwrap()],
        },
        HeaderFamily {
            kind: SectionKind::Analysis,
            era: "ocr-tolerant",
            patterns: vec![Regex::new(r"(?im)^\s*A\s*N\s*A\s*L\s*Y\s*S\s*[I1]\s*S:?\s*$").unwrap()],
        },
    ]
});

/// Document-end markers: closing valediction or closing-boilerplate
/// patterns. Searched starting AT OR AFTER each section's header so a
/// quoted letter embedded in Facts is not treated as the document's own
/// close (B4).
static END_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^\s*(Sincerely|Very truly yours|Respectfully submitted|Respectfully yours)[,.]?\s*$|^\s*cc:|^\s*Enclosure",
    )
    .unwrap()
});

/// Boilerplate patterns stripped from section content: agency
/// self-identification footnotes, page-number artefacts, address blocks,
/// standalone page references, statutory-reference disclaimer sentences,
/// with OCR-tolerant variants.
static BOILERPLATE: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?im)^\s*Page\s+\d+\s+of\s+\d+\s*$").unwrap(),
        Regex::new(r"(?im)^\s*-\s*\d+\s*-\s*$").unwrap(),
        Regex::new(r"(?i)Fair Political Practices Commission\s*\n?\s*\d+\s+[A-Za-z\s]+Street").unwrap(),
        Regex::new(r"(?i)This\s+(?:letter|advice)\s+is\s+based\s+on\s+the\s+facts\s+presented[^.]*\.").unwrap(),
        Regex::new(r"(?im)^\s*Sacramento,\s*CA\s*\d{5}\s*$").unwrap(),
    ]
});

struct HeaderMatch {
    kind: SectionKind,
    start: usize,
    content_start: usize,
    era: &'static str,
}

fn find_first_in_family(text: &str, family: &[HeaderFamily], kind: SectionKind) -> Option<HeaderMatch> {
    family
        .iter()
        .filter(|f| f.kind == kind)
        .flat_map(|f| f.patterns.iter().map(move |p| (f.era, p)))
        .filter_map(|(era, p)| {
            p.find(text).map(|m| HeaderMatch {
                kind,
                start: m.start(),
                content_start: m.end(),
                era,
            })
        })
        .min_by_key(|m| m.start)
}

fn find_header(text: &str, kind: SectionKind) -> Option<HeaderMatch> {
    for family in [&*MODERN, &*NUMBERED, &*OLDER] {
        if let Some(m) = find_first_in_family(text, family, kind) {
            return Some(m);
        }
    }
    find_first_in_family(text, &OCR_TOLERANT, kind)
}

fn clean_content(raw: &str) -> String {
    let mut cleaned = raw.to_string();
    for pattern in BOILERPLATE.iter() {
        cleaned = pattern.replace_all(&cleaned, "").to_string();
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ").trim().to_string()
}

fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

/// Parse Question/Conclusion/Facts/Analysis sections out of `text`.
///
/// `year` feeds the confidence era adjustment; `min_section_words` is the
/// configurable threshold (spec open question, default 1) below which a
/// matched section is dropped with a validation note rather than kept.
pub fn parse_sections(text: &str, year: i32, min_section_words: usize) -> Sections {
    let mut headers: Vec<HeaderMatch> = Vec::new();
    for kind in [
        SectionKind::Question,
        SectionKind::Conclusion,
        SectionKind::Facts,
        SectionKind::Analysis,
    ] {
        if let Some(m) = find_header(text, kind) {
            headers.push(m);
        }
    }
    headers.sort_by_key(|m| m.start);

    let mut notes = Vec::new();
    let mut parse_method = "none".to_string();
    let mut question = None;
    let mut conclusion = None;
    let mut facts = None;
    let mut analysis = None;

    for (idx, header) in headers.iter().enumerate() {
        let next_header_start = headers.get(idx + 1).map(|h| h.start);
        let end_marker_start = END_MARKERS
            .find_at(text, header.start)
            .map(|m| m.start())
            .filter(|&pos| pos >= header.content_start);

        let content_end = [next_header_start, end_marker_start, Some(text.len())]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(text.len());

        let raw_slice = &text[header.content_start.min(text.len())..content_end.max(header.content_start)];
        let cleaned = clean_content(raw_slice);

        if word_count(&cleaned) < min_section_words {
            notes.push(format!("{} section dropped: below minimum word count", header.kind.as_str()));
            continue;
        }

        if parse_method == "none" {
            parse_method = header.era.to_string();
        }

        match header.kind {
            SectionKind::Question => question = Some(cleaned),
            SectionKind::Conclusion => conclusion = Some(cleaned),
            SectionKind::Facts => facts = Some(cleaned),
            SectionKind::Analysis => analysis = Some(cleaned),
        }
    }

    if let (Some(q), Some(c)) = (
        headers.iter().find(|h| h.kind == SectionKind::Question),
        headers.iter().find(|h| h.kind == SectionKind::Conclusion),
    ) {
        if c.start < q.start {
            notes.push("conclusion appears before question".to_string());
        }
    }

    let has_standard_format = question.is_some() && conclusion.is_some() && parse_method != "ocr-tolerant";

    let base = if question.is_some() && conclusion.is_some() {
        0.9
    } else if question.is_some() || conclusion.is_some() {
        0.6
    } else if facts.is_some() || analysis.is_some() {
        0.4
    } else {
        0.0
    };

    let era_adjustment = if year >= 2000 {
        0.05
    } else if year < 1995 {
        -0.10
    } else {
        0.0
    };

    let penalty = 0.05 * notes.len() as f64;
    let confidence = (base + era_adjustment - penalty).clamp(0.0, 1.0);

    Sections {
        question,
        conclusion,
        facts,
        analysis,
        question_synthetic: None,
        conclusion_synthetic: None,
        parse_method,
        confidence,
        has_standard_format,
        notes,
    }
}
