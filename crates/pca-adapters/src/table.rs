//! Label-addressed reads over an HTML table.
//!
//! Columns are found by exact header text so the portal may reorder them freely.

use scraper::ElementRef;

pub(crate) fn child_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.children().filter_map(ElementRef::wrap)
}

fn children_named<'a>(
    element: ElementRef<'a>,
    name: &'static str,
) -> impl Iterator<Item = ElementRef<'a>> {
    child_elements(element).filter(move |child| child.value().name() == name)
}

fn header_cells<'a>(table: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    children_named(table, "thead")
        .flat_map(|head| children_named(head, "tr"))
        .flat_map(|row| children_named(row, "th"))
}

pub fn body_rows<'a>(table: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    children_named(table, "tbody").flat_map(|body| children_named(body, "tr"))
}

pub fn text_of(element: ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<String>();
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// 1-based position of the header whose trimmed text equals `label`.
pub fn column_index(table: ElementRef<'_>, label: &str) -> Option<usize> {
    header_cells(table)
        .position(|th| th.text().collect::<String>().trim() == label)
        .map(|index| index + 1)
}

pub fn cell_text(table: ElementRef<'_>, row: usize, label: &str) -> Option<String> {
    let column = column_index(table, label)?;
    let tr = body_rows(table).nth(row.checked_sub(1)?)?;
    let cell = child_elements(tr).nth(column - 1)?;
    if cell.value().name() != "td" {
        return None;
    }
    text_of(cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    const PLANS: &str = r#"
        <table>
          <thead><tr><th> Ano </th><th>Status</th><th>Identificação</th></tr></thead>
          <tbody>
            <tr><td>2024</td><td>
                Publicado
            </td><td>PCA 2024</td></tr>
            <tr><td>2023</td><td>Encerrado</td><td></td></tr>
          </tbody>
        </table>"#;

    fn with_table<T>(html: &str, f: impl FnOnce(ElementRef<'_>) -> T) -> T {
        let doc = Html::parse_fragment(html);
        let selector = Selector::parse("table").unwrap();
        let table = doc.select(&selector).next().expect("table");
        f(table)
    }

    #[test]
    fn headers_resolve_to_one_based_positions() {
        with_table(PLANS, |table| {
            assert_eq!(column_index(table, "Ano"), Some(1));
            assert_eq!(column_index(table, "Status"), Some(2));
            assert_eq!(column_index(table, "Identificação"), Some(3));
            assert_eq!(column_index(table, "Ausente"), None);
        });
    }

    #[test]
    fn matching_is_exact() {
        with_table(PLANS, |table| {
            assert_eq!(column_index(table, "status"), None);
            assert_eq!(column_index(table, "Identifica"), None);
        });
    }

    #[test]
    fn cells_are_read_by_row_and_label() {
        with_table(PLANS, |table| {
            assert_eq!(cell_text(table, 1, "Status").as_deref(), Some("Publicado"));
            assert_eq!(cell_text(table, 2, "Ano").as_deref(), Some("2023"));
        });
    }

    #[test]
    fn missing_column_row_or_text_is_absent() {
        with_table(PLANS, |table| {
            assert_eq!(cell_text(table, 1, "Ausente"), None);
            assert_eq!(cell_text(table, 3, "Ano"), None);
            assert_eq!(cell_text(table, 0, "Ano"), None);
            assert_eq!(cell_text(table, 2, "Identificação"), None);
        });
    }

    #[test]
    fn reordered_columns_are_still_found() {
        let html = r#"<table><thead><tr><th>Status</th><th>Ano</th></tr></thead>
            <tbody><tr><td>Publicado</td><td>2025</td></tr></tbody></table>"#;
        with_table(html, |table| {
            assert_eq!(cell_text(table, 1, "Ano").as_deref(), Some("2025"));
        });
    }
}
