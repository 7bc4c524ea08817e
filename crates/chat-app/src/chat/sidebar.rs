use std::rc::Rc;

use gpui::*;
use gpui_component::{
    ActiveTheme, VirtualListScrollHandle, h_flex, label::Label, list::ListItem, v_flex,
    v_virtual_list,
};

use artinfo_session::{ExchangeId, HistoryBucketView};

use crate::chat::events::ExchangeSelected;

const GROUP_HEADER_HEIGHT: f32 = 26.0;
const EXCHANGE_ROW_HEIGHT: f32 = 40.0;
const TITLE_MAX_CHARS: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
enum SidebarRow {
    MonthHeader(SharedString),
    Exchange {
        exchange: ExchangeId,
        title: SharedString,
        is_active: bool,
    },
}

/// Month-grouped list of answered questions.
pub struct HistorySidebar {
    rows: Vec<SidebarRow>,
    item_sizes: Rc<Vec<Size<Pixels>>>,
    scroll_handle: VirtualListScrollHandle,
}

impl EventEmitter<ExchangeSelected> for HistorySidebar {}

impl HistorySidebar {
    pub fn new(_cx: &mut Context<Self>) -> Self {
        Self {
            rows: Vec::new(),
            item_sizes: Rc::new(Vec::new()),
            scroll_handle: VirtualListScrollHandle::new(),
        }
    }

    pub fn set_history(&mut self, buckets: &[HistoryBucketView], cx: &mut Context<Self>) {
        let rows = flatten_history(buckets);
        if rows == self.rows {
            return;
        }

        self.item_sizes = Rc::new(rows.iter().map(row_size).collect());
        self.rows = rows;
        cx.notify();
    }

    fn select_exchange(&mut self, exchange: ExchangeId, cx: &mut Context<Self>) {
        cx.emit(ExchangeSelected { exchange });
    }

    fn render_empty_state(&self, cx: &Context<Self>) -> AnyElement {
        let theme = cx.theme();

        v_flex()
            .flex_1()
            .items_center()
            .justify_center()
            .px_4()
            .child(
                Label::new("No answers yet")
                    .text_sm()
                    .text_color(theme.foreground.opacity(0.55)),
            )
            .into_any_element()
    }

    fn render_history_list(&self, cx: &Context<Self>) -> AnyElement {
        if self.rows.is_empty() {
            return self.render_empty_state(cx);
        }

        let item_sizes = self.item_sizes.clone();
        let rows = self.rows.clone();

        v_flex()
            .flex_1()
            .min_h_0()
            .child(
                v_virtual_list(
                    cx.entity().clone(),
                    "history-list",
                    item_sizes,
                    move |_this, visible_range, _scroll_handle, cx| {
                        let theme = cx.theme();

                        visible_range
                            .map(|index| match &rows[index] {
                                SidebarRow::MonthHeader(label) => div()
                                    .w_full()
                                    .h(px(GROUP_HEADER_HEIGHT))
                                    .px_3()
                                    .flex()
                                    .items_center()
                                    .child(
                                        Label::new(label.clone())
                                            .text_xs()
                                            .text_color(theme.foreground.opacity(0.5)),
                                    )
                                    .into_any_element(),
                                SidebarRow::Exchange {
                                    exchange,
                                    title,
                                    is_active,
                                } => {
                                    let exchange = *exchange;

                                    div()
                                        .w_full()
                                        .h(px(EXCHANGE_ROW_HEIGHT))
                                        .px_2()
                                        .child(
                                            ListItem::new(("exchange", index))
                                                .w_full()
                                                .h_full()
                                                .px_3()
                                                .py_2()
                                                .rounded_md()
                                                .selected(*is_active)
                                                .on_click(cx.listener(
                                                    move |this, _event: &ClickEvent, _window, cx| {
                                                        this.select_exchange(exchange, cx);
                                                    },
                                                ))
                                                .child(
                                                    h_flex().w_full().items_center().child(
                                                        div().flex_1().min_w_0().truncate().child(
                                                            Label::new(title.clone()).text_sm(),
                                                        ),
                                                    ),
                                                ),
                                        )
                                        .into_any_element()
                                }
                            })
                            .collect()
                    },
                )
                .w_full()
                .flex_1()
                .track_scroll(&self.scroll_handle),
            )
            .into_any_element()
    }
}

impl Render for HistorySidebar {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .size_full()
            .pt_2()
            .bg(theme.background)
            .child(self.render_history_list(cx))
    }
}

fn flatten_history(buckets: &[HistoryBucketView]) -> Vec<SidebarRow> {
    let mut rows = Vec::new();

    for bucket in buckets.iter().filter(|bucket| !bucket.entries.is_empty()) {
        rows.push(SidebarRow::MonthHeader(bucket.label.clone().into()));
        rows.extend(bucket.entries.iter().map(|entry| SidebarRow::Exchange {
            exchange: entry.exchange,
            title: entry_title(&entry.title).into(),
            is_active: entry.is_active,
        }));
    }

    rows
}

/// First non-blank line of the answer, shortened for a single row.
fn entry_title(answer: &str) -> String {
    let line = answer
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("Untitled answer");

    if line.chars().count() <= TITLE_MAX_CHARS {
        return line.to_string();
    }

    let mut title: String = line.chars().take(TITLE_MAX_CHARS).collect();
    title.push('…');
    title
}

fn row_size(row: &SidebarRow) -> Size<Pixels> {
    let height = match row {
        SidebarRow::MonthHeader(_) => GROUP_HEADER_HEIGHT,
        SidebarRow::Exchange { .. } => EXCHANGE_ROW_HEIGHT,
    };

    size(px(240.), px(height))
}

#[cfg(test)]
mod tests {
    use artinfo_session::HistoryEntryView;

    use super::*;

    fn entry(id: u64, title: &str, is_active: bool) -> HistoryEntryView {
        HistoryEntryView {
            exchange: ExchangeId::new(id),
            title: title.to_string(),
            is_active,
        }
    }

    #[test]
    fn headers_precede_their_entries_in_bucket_order() {
        let buckets = vec![
            HistoryBucketView {
                label: "March 2024".to_string(),
                entries: vec![entry(1, "Monet", false), entry(3, "Manet", true)],
            },
            HistoryBucketView {
                label: "January 2024".to_string(),
                entries: vec![entry(2, "Degas", false)],
            },
        ];

        let rows = flatten_history(&buckets);

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0], SidebarRow::MonthHeader("March 2024".into()));
        assert_eq!(
            rows[2],
            SidebarRow::Exchange {
                exchange: ExchangeId::new(3),
                title: "Manet".into(),
                is_active: true,
            }
        );
        assert_eq!(rows[3], SidebarRow::MonthHeader("January 2024".into()));
    }

    #[test]
    fn titles_use_first_line_and_are_shortened() {
        assert_eq!(entry_title("\n  Starry Night\nby Van Gogh"), "Starry Night");
        assert_eq!(entry_title("   "), "Untitled answer");

        let long = "a".repeat(TITLE_MAX_CHARS + 10);
        let title = entry_title(&long);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 1);
        assert!(title.ends_with('…'));
    }
}
