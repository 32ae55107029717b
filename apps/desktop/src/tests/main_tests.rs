use super::*;

#[test]
fn parses_button_commands_and_aliases() {
    assert_eq!(parse_input("start"), Some(Input::Press(Button::StartGame)));
    assert_eq!(parse_input("  a "), Some(Input::Press(Button::Attack)));
    assert_eq!(parse_input("collect"), Some(Input::Press(Button::CollectItem)));
    assert_eq!(parse_input("q"), Some(Input::Quit));
    assert_eq!(parse_input("dance"), None);
    assert_eq!(parse_input(""), None);
}

#[test]
fn end_takes_an_optional_score() {
    assert_eq!(parse_input("end"), Some(Input::End(0)));
    assert_eq!(parse_input("end 250"), Some(Input::End(250)));
    assert_eq!(parse_input("end lots"), None);
}

#[test]
fn terminal_view_starts_like_a_fresh_page() {
    let view = TerminalView::new();
    assert!(view.is_enabled(Button::StartGame));
    assert!(!view.is_enabled(Button::Attack));
    assert!(!view.is_enabled(Button::CollectItem));

    view.set_button_enabled(Button::Attack, true);
    view.set_button_enabled(Button::StartGame, false);
    assert!(view.is_enabled(Button::Attack));
    assert!(!view.is_enabled(Button::StartGame));
}
