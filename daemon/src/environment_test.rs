use super::*;
use crate::test_support::{FakeRunner, fake_path, probe};

#[test]
fn test_detect_x11_from_session_type() {
    let path = fake_path(&[]);
    let probe = probe(&[("XDG_SESSION_TYPE", "x11")], &path, FakeRunner::failing());
    assert_eq!(probe.session_type(), SessionType::X11);
}

#[test]
fn test_detect_wayland_from_session_type() {
    let path = fake_path(&[]);
    let probe = probe(
        &[("XDG_SESSION_TYPE", "Wayland")],
        &path,
        FakeRunner::failing(),
    );
    assert_eq!(probe.session_type(), SessionType::Wayland);
}

#[test]
fn test_detect_wayland_from_display_variable() {
    let path = fake_path(&[]);
    let probe = probe(
        &[("XDG_SESSION_TYPE", ""), ("WAYLAND_DISPLAY", "wayland-0")],
        &path,
        FakeRunner::failing(),
    );
    assert_eq!(probe.session_type(), SessionType::Wayland);
}

#[test]
fn test_detect_x11_from_display_variable() {
    let path = fake_path(&[]);
    let probe = probe(&[("DISPLAY", ":0")], &path, FakeRunner::failing());
    assert_eq!(probe.session_type(), SessionType::X11);
}

#[test]
fn test_detect_unknown_session() {
    let path = fake_path(&[]);
    let probe = probe(&[], &path, FakeRunner::failing());
    assert_eq!(probe.session_type(), SessionType::Unknown);
}

#[test]
fn test_detect_desktops() {
    let path = fake_path(&[]);
    let cases = [
        ("GNOME", DesktopEnvironment::Gnome),
        ("KDE", DesktopEnvironment::Kde),
        ("plasma", DesktopEnvironment::Kde),
        ("XFCE", DesktopEnvironment::Xfce),
        ("X-Cinnamon", DesktopEnvironment::Cinnamon),
        ("MATE", DesktopEnvironment::Mate),
        ("LXQt", DesktopEnvironment::Lxqt),
        ("Hyprland", DesktopEnvironment::Hyprland),
        ("sway", DesktopEnvironment::Sway),
        ("SomeRandomDE", DesktopEnvironment::Unknown),
    ];

    for (value, expected) in cases {
        let probe = probe(&[("XDG_CURRENT_DESKTOP", value)], &path, FakeRunner::failing());
        assert_eq!(probe.desktop_environment(), expected, "for {value}");
    }
}

#[test]
fn test_desktop_from_session_name() {
    let path = fake_path(&[]);
    let probe = probe(&[("DESKTOP_SESSION", "plasmawayland")], &path, FakeRunner::failing());
    assert_eq!(probe.desktop_environment(), DesktopEnvironment::Kde);
}

#[test]
fn test_find_executable_requires_exec_bit() {
    let path = fake_path(&["xdotool"]);
    std::fs::write(path.path().join("ydotool"), "not executable").unwrap();
    let probe = probe(&[], &path, FakeRunner::failing());

    assert_eq!(
        probe.find_executable("xdotool"),
        Some(path.path().join("xdotool"))
    );
    assert!(probe.has_xdotool());
    assert!(!probe.has_ydotool());
    assert!(!probe.has_nerd_dictation());
}

#[test]
fn test_portal_requires_bus_tool() {
    // Runner would succeed, but neither busctl nor gdbus is installed.
    let path = fake_path(&[]);
    let runner = FakeRunner::succeeding();
    let probe = probe(&[], &path, runner.clone());

    assert!(!probe.has_portal_support());
    assert!(runner.calls().is_empty());
}

#[test]
fn test_portal_falls_back_to_gdbus() {
    let path = fake_path(&["busctl", "gdbus"]);
    let runner = FakeRunner::succeeding();
    runner.respond("busctl", crate::test_support::Outcome::Fail);
    let probe = probe(&[], &path, runner.clone());

    assert!(probe.has_portal_support());
    assert_eq!(runner.programs(), vec!["busctl", "gdbus"]);
}

#[test]
fn test_recommend_portal_on_wayland() {
    let path = fake_path(&["busctl", "ydotool", "xdotool"]);
    let probe = probe(
        &[("XDG_SESSION_TYPE", "wayland")],
        &path,
        FakeRunner::succeeding(),
    );
    assert_eq!(probe.recommended_backend(), Some(BackendKind::Portal));
}

#[test]
fn test_recommend_ydotool_on_wayland_without_portal() {
    let path = fake_path(&["ydotool", "xdotool"]);
    let probe = probe(
        &[("XDG_SESSION_TYPE", "wayland")],
        &path,
        FakeRunner::succeeding(),
    );
    assert_eq!(probe.recommended_backend(), Some(BackendKind::Ydotool));
}

#[test]
fn test_recommend_xdotool_on_x11() {
    let path = fake_path(&["busctl", "xdotool"]);
    let probe = probe(&[("XDG_SESSION_TYPE", "x11")], &path, FakeRunner::succeeding());
    assert_eq!(probe.recommended_backend(), Some(BackendKind::Xdotool));
}

#[test]
fn test_recommend_generic_fallback() {
    // X11 session without xdotool still finds ydotool.
    let path = fake_path(&["ydotool"]);
    let probe = probe(&[("XDG_SESSION_TYPE", "x11")], &path, FakeRunner::failing());
    assert_eq!(probe.recommended_backend(), Some(BackendKind::Ydotool));
}

#[test]
fn test_recommend_none() {
    let path = fake_path(&[]);
    let probe = probe(&[], &path, FakeRunner::failing());
    assert_eq!(probe.recommended_backend(), None);
}

#[test]
fn test_environment_info_entries() {
    let path = fake_path(&["xdotool", "nerd-dictation"]);
    let probe = probe(
        &[("XDG_SESSION_TYPE", "x11"), ("XDG_CURRENT_DESKTOP", "GNOME")],
        &path,
        FakeRunner::failing(),
    );

    let info = probe.environment_info();
    assert_eq!(info.session_type, SessionType::X11);
    assert!(info.has_nerd_dictation);

    let entries: HashMap<_, _> = info.entries().into_iter().collect();
    assert_eq!(entries["session_type"], "x11");
    assert_eq!(entries["desktop_environment"], "gnome");
    assert_eq!(entries["has_xdotool"], "true");
    assert_eq!(entries["has_ydotool"], "false");
    assert_eq!(entries["recommended_backend"], "xdotool");
    assert_eq!(entries.len(), 10);
}
