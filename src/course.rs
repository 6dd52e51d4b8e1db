use scraper::{ElementRef, Html, Selector};

const ROW_SELECTOR: &str = "div.hoz_course_row";
const TITLE_SELECTOR: &str = "h2";
const ENROL_BUTTON_SELECTOR: &str = "input[type=\"button\"][onclick]";
const CHAPTER_LINK_SELECTOR: &str = "div.hoz_c_lf.lf";
const DURATION_SELECTOR: &str = "span[title=\"课程时长\"]";
const HOUR_SELECTOR: &str = "span[title=\"学时\"]";
const MISSING_LABEL: &str = "-";

/// One enrolled course as listed by the portal. `course_id` is the identity;
/// the media fields stay empty until the course is resolved for a run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Course {
    pub name: String,
    pub course_id: String,
    pub chapter_id: String,
    pub duration_label: String,
    pub hour_label: String,
    pub duration_seconds: Option<u64>,
    pub reference_id: Option<String>,
}

impl Course {
    pub fn new(
        name: impl Into<String>,
        course_id: impl Into<String>,
        chapter_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            course_id: course_id.into(),
            chapter_id: chapter_id.into(),
            duration_label: MISSING_LABEL.to_string(),
            hour_label: MISSING_LABEL.to_string(),
            duration_seconds: None,
            reference_id: None,
        }
    }

    /// Records the resolved media details. Later calls in the same run keep
    /// the first values.
    pub fn mark_resolved(&mut self, duration_seconds: u64, reference_id: &str) {
        if self.duration_seconds.is_none() {
            self.duration_seconds = Some(duration_seconds);
        }
        if self.reference_id.is_none() {
            self.reference_id = Some(reference_id.to_string());
        }
    }
}

/// Scrapes the enrolled-courses page. Rows missing a piece yield empty ids
/// or `-` labels rather than failing the whole listing.
pub fn parse_course_listing(html: &str) -> Vec<Course> {
    let doc = Html::parse_document(html);
    let Some(row_sel) = selector(ROW_SELECTOR) else {
        return Vec::new();
    };
    doc.select(&row_sel).map(parse_course_row).collect()
}

fn parse_course_row(row: ElementRef<'_>) -> Course {
    let name = first_match(row, TITLE_SELECTOR)
        .map(|title| strip_whitespace(&title.text().collect::<String>()))
        .unwrap_or_default();

    let course_id = first_match(row, ENROL_BUTTON_SELECTOR)
        .and_then(|button| button.value().attr("onclick"))
        .map(|onclick| digits_after(onclick, "addUrl("))
        .unwrap_or_default();

    let chapter_id = first_match(row, CHAPTER_LINK_SELECTOR)
        .and_then(|div| div.value().attr("onclick"))
        .map(|onclick| digits_after(onclick, "courseId="))
        .unwrap_or_default();

    Course {
        name,
        course_id,
        chapter_id,
        duration_label: span_label(row, DURATION_SELECTOR),
        hour_label: span_label(row, HOUR_SELECTOR),
        duration_seconds: None,
        reference_id: None,
    }
}

fn span_label(row: ElementRef<'_>, css: &str) -> String {
    first_match(row, css)
        .map(|span| span.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| MISSING_LABEL.to_string())
}

pub(crate) fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

pub(crate) fn first_match<'a>(scope: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let sel = selector(css)?;
    scope.select(&sel).next()
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|ch| !ch.is_whitespace()).collect()
}

/// Digits that immediately follow `marker`, or empty when there are none.
pub(crate) fn digits_after(haystack: &str, marker: &str) -> String {
    let Some(start) = haystack.find(marker) else {
        return String::new();
    };
    haystack[start + marker.len()..]
        .chars()
        .take_while(|ch| ch.is_ascii_digit())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
        <div class="hoz_course_row">
            <div class="hoz_c_lf lf" onclick="window.open('/portal/study_play.do?courseId=2001')"></div>
            <h2>
                习近平新时代
                中国特色社会主义思想
            </h2>
            <span title="课程时长">45分钟</span>
            <span title="学时">1.00 学时</span>
            <input type="button" value="学习" onclick="addUrl(1001,'x')"/>
        </div>
        <div class="hoz_course_row">
            <h2>Web 开发</h2>
        </div>
        </body></html>
    "#;

    #[test]
    fn listing_rows_become_courses() {
        let courses = parse_course_listing(LISTING);
        assert_eq!(courses.len(), 2);

        let first = &courses[0];
        assert_eq!(first.name, "习近平新时代中国特色社会主义思想");
        assert_eq!(first.course_id, "1001");
        assert_eq!(first.chapter_id, "2001");
        assert_eq!(first.duration_label, "45分钟");
        assert_eq!(first.hour_label, "1.00 学时");
        assert_eq!(first.duration_seconds, None);
        assert_eq!(first.reference_id, None);
    }

    #[test]
    fn incomplete_row_degrades_to_placeholders() {
        let courses = parse_course_listing(LISTING);
        let second = &courses[1];
        assert_eq!(second.name, "Web开发");
        assert_eq!(second.course_id, "");
        assert_eq!(second.chapter_id, "");
        assert_eq!(second.duration_label, "-");
        assert_eq!(second.hour_label, "-");
    }

    #[test]
    fn empty_page_lists_nothing() {
        assert!(parse_course_listing("<html><body></body></html>").is_empty());
    }

    #[test]
    fn digits_after_marker() {
        assert_eq!(digits_after("addUrl(123,'a')", "addUrl("), "123");
        assert_eq!(digits_after("addUrl('a')", "addUrl("), "");
        assert_eq!(digits_after("nothing here", "courseId="), "");
    }

    #[test]
    fn resolution_is_recorded_once() {
        let mut course = Course::new("C1", "1", "2");
        course.mark_resolved(600, "res01");
        course.mark_resolved(900, "res02");
        assert_eq!(course.duration_seconds, Some(600));
        assert_eq!(course.reference_id.as_deref(), Some("res01"));
    }
}
