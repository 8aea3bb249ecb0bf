//! The fixed chapter index and its sitemap.

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::error::{Error, Result};
use crate::lessons::LessonKind;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Chapter {
    /// 1-based.
    pub index: usize,
    pub slug: &'static str,
    pub title: &'static str,
    pub lessons: &'static [LessonKind],
    /// Markdown shown above the lessons.
    pub intro: &'static str,
}

impl Chapter {
    pub fn path(&self) -> String {
        format!("/chapter/{}", self.index)
    }
}

const CHAPTERS: &[Chapter] = &[
    Chapter {
        index: 1,
        slug: "information",
        title: "Information and Impurity",
        lessons: &[LessonKind::Entropy],
        intro: "How *mixed* is a set of labels? Entropy answers in bits: \
                zero for a pure node, one bit for a fair coin, `log2 k` for `k` \
                equally likely classes. Decision trees split on whatever lowers it most.",
    },
    Chapter {
        index: 2,
        slug: "regression",
        title: "Fitting by Gradient Descent",
        lessons: &[
            LessonKind::GradientDescent,
            LessonKind::LinearRegression,
            LessonKind::LogisticRegression,
        ],
        intro: "Most models are trained the same way: write down a loss, follow its \
                negative gradient, stop when it flattens out.\n\n\
                Start with a bowl, then fit a line, then bend the line through a sigmoid.",
    },
    Chapter {
        index: 3,
        slug: "clustering",
        title: "Clustering",
        lessons: &[LessonKind::Kmeans],
        intro: "Without labels, structure has to come from distances alone. \
                K-means alternates two easy steps and never increases its objective.",
    },
    Chapter {
        index: 4,
        slug: "semi-supervised",
        title: "Learning from a Few Labels",
        lessons: &[LessonKind::LabelPropagation],
        intro: "When only a handful of points are labeled, a neighbourhood graph lets \
                those labels flow to the rest of the data.",
    },
    Chapter {
        index: 5,
        slug: "regularization",
        title: "Regularization",
        lessons: &[LessonKind::Lasso],
        intro: "An L1 penalty does more than shrink: past a threshold it sets \
                coefficients to **exactly** zero, selecting features as it goes.",
    },
    Chapter {
        index: 6,
        slug: "evaluation",
        title: "Evaluating Classifiers",
        lessons: &[LessonKind::Roc],
        intro: "A score is not a decision until you pick a threshold. The ROC curve \
                shows every threshold at once.",
    },
    Chapter {
        index: 7,
        slug: "margins",
        title: "Maximum Margin",
        lessons: &[LessonKind::Svm],
        intro: "Among all separating lines, prefer the one farthest from both classes.",
    },
];

pub fn chapters() -> &'static [Chapter] {
    CHAPTERS
}

pub fn chapter(index: usize) -> Result<&'static Chapter> {
    CHAPTERS
        .iter()
        .find(|c| c.index == index)
        .ok_or(Error::UnknownChapter(index))
}

/// Chapter that hosts `kind`, if any.
pub fn chapter_of(kind: LessonKind) -> Option<&'static Chapter> {
    CHAPTERS.iter().find(|c| c.lessons.contains(&kind))
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SitemapEntry {
    pub loc: String,
    pub priority: f32,
}

/// The root page followed by one entry per chapter.
pub fn sitemap_entries(base_url: &str) -> Vec<SitemapEntry> {
    let base = base_url.trim_end_matches('/');
    let mut out = Vec::with_capacity(CHAPTERS.len() + 1);
    out.push(SitemapEntry {
        loc: format!("{base}/"),
        priority: 1.0,
    });
    for c in CHAPTERS {
        out.push(SitemapEntry {
            loc: format!("{base}{}", c.path()),
            priority: 0.8,
        });
    }
    out
}

pub fn sitemap_xml(base_url: &str) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for e in sitemap_entries(base_url) {
        xml.push_str(&format!(
            "  <url><loc>{}</loc><priority>{:.1}</priority></url>\n",
            crate::render::escape_xml(&e.loc),
            e.priority
        ));
    }
    xml.push_str("</urlset>\n");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_contiguous_from_one() {
        for (i, c) in chapters().iter().enumerate() {
            assert_eq!(c.index, i + 1);
            assert!(!c.lessons.is_empty());
            assert!(!c.intro.trim().is_empty());
        }
    }

    #[test]
    fn every_lesson_has_a_chapter() {
        for k in LessonKind::all() {
            assert!(chapter_of(*k).is_some(), "{}", k.label());
        }
    }

    #[test]
    fn out_of_range_chapter_is_an_error() {
        assert_eq!(chapter(0), Err(Error::UnknownChapter(0)));
        assert!(chapter(99).is_err());
        assert_eq!(chapter(2).map(|c| c.slug), Ok("regression"));
    }

    #[test]
    fn sitemap_lists_root_and_chapters() {
        let entries = sitemap_entries("https://example.org/");
        assert_eq!(entries.len(), chapters().len() + 1);
        assert_eq!(entries[0].loc, "https://example.org/");
        assert_eq!(entries[1].loc, "https://example.org/chapter/1");

        let xml = sitemap_xml("https://example.org");
        assert_eq!(xml.matches("<url>").count(), chapters().len() + 1);
        assert!(xml.ends_with("</urlset>\n"));
    }
}
