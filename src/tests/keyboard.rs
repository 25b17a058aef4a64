use std::collections::BTreeSet;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::info;
use serde_json::json;

use crate::core::config::KeyboardLayout;
use crate::core::error::{DiagError, Result};
use crate::core::operator::CaptureEnd;
use crate::core::test::{DeviceTest, IssueSeverity, TestContext, TestIssue, TestResult, TestStatus};

/// Printable keys of the US layout, one `unshifted shifted` pair per key.
const US_KEYS: &str = "`~ 1! 2@ 3# 4$ 5% 6^ 7& 8* 9( 0) -_ =+ [{ ]} \\| ;: '\" ,< .> /?";

/// Printable keys of the Brazilian ABNT2 layout.
const ABNT2_KEYS: &str = "'\" 1! 2@ 3# 4$ 5% 6¨ 7& 8* 9( 0) -_ =+ ´` [{ ~^ ]} \\| ,< .> ;: /? çÇ";

/// How many missing keys to name in the result message.
const MISSING_SHOWN: usize = 12;

/// One physical key and the key codes it can produce.
#[derive(Debug, Clone)]
struct KeySpec {
    label: String,
    codes: Vec<KeyCode>,
}

/// Tracks which keys of a layout have been pressed.
#[derive(Debug, Clone)]
pub struct KeyboardCoverage {
    keys: Vec<KeySpec>,
    pressed: Vec<bool>,
    modifiers: BTreeSet<&'static str>,
    presses: usize,
}

impl KeyboardCoverage {
    pub fn new(layout: KeyboardLayout) -> Self {
        let printable = match layout {
            KeyboardLayout::Us => US_KEYS,
            KeyboardLayout::Abnt2 => ABNT2_KEYS,
        };

        let mut keys: Vec<KeySpec> = printable
            .split_whitespace()
            .map(|pair| KeySpec {
                label: pair.to_string(),
                codes: pair.chars().map(KeyCode::Char).collect(),
            })
            .collect();

        keys.extend(('a'..='z').map(|c| KeySpec {
            label: c.to_ascii_uppercase().to_string(),
            codes: vec![KeyCode::Char(c), KeyCode::Char(c.to_ascii_uppercase())],
        }));

        keys.extend((1..=12).map(|n| KeySpec {
            label: format!("F{}", n),
            codes: vec![KeyCode::F(n)],
        }));

        let special = [
            ("Esc", vec![KeyCode::Esc]),
            ("Backspace", vec![KeyCode::Backspace]),
            ("Tab", vec![KeyCode::Tab, KeyCode::BackTab]),
            ("Enter", vec![KeyCode::Enter]),
            ("Space", vec![KeyCode::Char(' ')]),
            ("Insert", vec![KeyCode::Insert]),
            ("Delete", vec![KeyCode::Delete]),
            ("Home", vec![KeyCode::Home]),
            ("End", vec![KeyCode::End]),
            ("PgUp", vec![KeyCode::PageUp]),
            ("PgDn", vec![KeyCode::PageDown]),
            ("Up", vec![KeyCode::Up]),
            ("Down", vec![KeyCode::Down]),
            ("Left", vec![KeyCode::Left]),
            ("Right", vec![KeyCode::Right]),
        ];
        keys.extend(special.into_iter().map(|(label, codes)| KeySpec {
            label: label.to_string(),
            codes,
        }));

        let pressed = vec![false; keys.len()];
        Self {
            keys,
            pressed,
            modifiers: BTreeSet::new(),
            presses: 0,
        }
    }

    /// Records a key press; returns the label of a key seen for the first time.
    pub fn record(&mut self, key: &KeyEvent) -> Option<&str> {
        self.presses += 1;

        for (flag, name) in [
            (KeyModifiers::SHIFT, "Shift"),
            (KeyModifiers::CONTROL, "Ctrl"),
            (KeyModifiers::ALT, "Alt"),
            (KeyModifiers::SUPER, "Super"),
        ] {
            if key.modifiers.contains(flag) {
                self.modifiers.insert(name);
            }
        }

        let index = self.keys.iter().position(|spec| spec.codes.contains(&key.code))?;
        if self.pressed[index] {
            return None;
        }
        self.pressed[index] = true;
        Some(&self.keys[index].label)
    }

    pub fn total(&self) -> usize {
        self.keys.len()
    }

    pub fn covered(&self) -> usize {
        self.pressed.iter().filter(|p| **p).count()
    }

    pub fn presses(&self) -> usize {
        self.presses
    }

    pub fn is_complete(&self) -> bool {
        self.pressed.iter().all(|p| *p)
    }

    pub fn missing(&self) -> Vec<&str> {
        self.keys
            .iter()
            .zip(&self.pressed)
            .filter(|(_, pressed)| !**pressed)
            .map(|(spec, _)| spec.label.as_str())
            .collect()
    }

    pub fn modifiers(&self) -> Vec<&'static str> {
        self.modifiers.iter().copied().collect()
    }
}

/// Asks the operator to press every key and reports which ones never arrived.
pub struct KeyboardTest;

impl DeviceTest for KeyboardTest {
    fn name(&self) -> &'static str {
        "keyboard"
    }

    fn title(&self) -> &'static str {
        "Keyboard"
    }

    fn interactive(&self) -> bool {
        true
    }

    fn initialize(&self, ctx: &TestContext) -> Result<()> {
        if !ctx.operator.is_attended() {
            return Err(DiagError::Unsupported(
                "the keyboard test needs an operator at the console".to_string(),
            ));
        }
        Ok(())
    }

    fn execute(&self, ctx: &TestContext) -> Result<TestResult> {
        let layout = ctx.config.keyboard_layout;
        let mut coverage = KeyboardCoverage::new(layout);
        info!("Keyboard capture started ({:?} layout, {} keys)", layout, coverage.total());

        ctx.operator.message(&format!(
            "Press every key once ({} keys). Ctrl+D finishes early, Ctrl+C aborts. Time limit: {}.",
            coverage.total(),
            humantime::format_duration(ctx.config.keyboard_timeout)
        ));

        let total = coverage.total();
        let end = ctx.operator.capture_keys(ctx.config.keyboard_timeout, &mut |key| {
            if let Some(label) = coverage.record(&key).map(str::to_string) {
                ctx.operator
                    .message(&format!("  {:<10} {}/{}", label, coverage.covered(), total));
            }
            !coverage.is_complete()
        })?;

        let missing = coverage.missing();
        let details = json!({
            "layout": layout,
            "total_keys": total,
            "keys_pressed": coverage.covered(),
            "key_presses": coverage.presses(),
            "missing_keys": missing,
            "modifiers_seen": coverage.modifiers(),
            "capture_end": format!("{:?}", end),
        });

        let result = match end {
            CaptureEnd::Aborted => TestResult::new(
                self.name(),
                self.title(),
                TestStatus::Failed,
                "Keyboard test aborted by the operator",
            ),
            CaptureEnd::TimedOut if coverage.presses() == 0 => TestResult::new(
                self.name(),
                self.title(),
                TestStatus::Failed,
                "No key presses received",
            )
            .with_issue(
                TestIssue::new("keyboard", IssueSeverity::High, "Keyboard produced no input")
                    .with_action("Check the keyboard connector or ribbon cable"),
            ),
            _ if coverage.is_complete() => TestResult::new(
                self.name(),
                self.title(),
                TestStatus::Passed,
                format!("All {} keys registered", total),
            ),
            _ => {
                let mut shown = missing.iter().take(MISSING_SHOWN).copied().collect::<Vec<_>>().join(" ");
                if missing.len() > MISSING_SHOWN {
                    shown.push_str(" ...");
                }
                TestResult::new(
                    self.name(),
                    self.title(),
                    TestStatus::Partial,
                    format!("{}/{} keys registered", coverage.covered(), total),
                )
                .with_issue(
                    TestIssue::new(
                        "keyboard",
                        IssueSeverity::Medium,
                        format!("{} key(s) never registered: {}", missing.len(), shown),
                    )
                    .with_action("Retest the listed keys; replace the keyboard if they stay silent"),
                )
            }
        };

        Ok(result.with_details(details))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::TestConfig;
    use crate::core::operator::{ScriptedOperator, UnattendedOperator};
    use crate::core::platform::ScriptedShell;

    fn every_key(layout: KeyboardLayout) -> Vec<KeyEvent> {
        KeyboardCoverage::new(layout)
            .keys
            .iter()
            .map(|spec| KeyEvent::from(spec.codes[0]))
            .collect()
    }

    fn run(operator: &ScriptedOperator) -> TestResult {
        let config = TestConfig::default();
        let shell = ScriptedShell::other();
        let ctx = TestContext { config: &config, shell: &shell, operator };
        KeyboardTest.execute(&ctx).unwrap()
    }

    #[test]
    fn test_layout_sizes() {
        // 21 printable pairs + 26 letters + 12 function keys + 15 specials
        assert_eq!(KeyboardCoverage::new(KeyboardLayout::Us).total(), 74);
        // ABNT2 adds the dead-key column and Ç
        assert_eq!(KeyboardCoverage::new(KeyboardLayout::Abnt2).total(), 76);
    }

    #[test]
    fn test_record_counts_each_key_once() {
        let mut coverage = KeyboardCoverage::new(KeyboardLayout::Us);

        assert_eq!(coverage.record(&KeyEvent::from(KeyCode::Char('a'))), Some("A"));
        assert_eq!(
            coverage.record(&KeyEvent::new(KeyCode::Char('A'), KeyModifiers::SHIFT)),
            None
        );
        assert_eq!(coverage.record(&KeyEvent::from(KeyCode::Char('!'))), Some("1!"));
        assert_eq!(coverage.record(&KeyEvent::from(KeyCode::BackTab)), Some("Tab"));
        assert_eq!(coverage.record(&KeyEvent::from(KeyCode::CapsLock)), None);

        assert_eq!(coverage.covered(), 3);
        assert_eq!(coverage.presses(), 5);
        assert_eq!(coverage.modifiers(), vec!["Shift"]);
        assert!(!coverage.missing().contains(&"A"));
    }

    #[test]
    fn test_abnt2_cedilla() {
        let mut coverage = KeyboardCoverage::new(KeyboardLayout::Abnt2);
        assert_eq!(coverage.record(&KeyEvent::from(KeyCode::Char('Ç'))), Some("çÇ"));

        let mut us = KeyboardCoverage::new(KeyboardLayout::Us);
        assert_eq!(us.record(&KeyEvent::from(KeyCode::Char('ç'))), None);
    }

    #[test]
    fn test_every_key_passes() {
        let operator = ScriptedOperator::new().press_keys(every_key(KeyboardLayout::Us), CaptureEnd::TimedOut);

        let result = run(&operator);
        assert_eq!(result.status, TestStatus::Passed);
        assert_eq!(result.details["missing_keys"].as_array().map(Vec::len), Some(0));
    }

    #[test]
    fn test_missing_keys_are_partial() {
        let mut keys = every_key(KeyboardLayout::Us);
        keys.retain(|k| k.code != KeyCode::F(5) && k.code != KeyCode::Char('q'));
        let operator = ScriptedOperator::new().press_keys(keys, CaptureEnd::Finished);

        let result = run(&operator);
        assert_eq!(result.status, TestStatus::Partial);
        assert_eq!(result.details["missing_keys"], json!(["Q", "F5"]));
        assert!(result.issues[0].message.contains("2 key(s)"));
    }

    #[test]
    fn test_abort_fails() {
        let operator = ScriptedOperator::new()
            .press_keys(vec![KeyEvent::from(KeyCode::Char('x'))], CaptureEnd::Aborted);

        let result = run(&operator);
        assert_eq!(result.status, TestStatus::Failed);
        assert!(result.message.contains("aborted"));
    }

    #[test]
    fn test_silent_keyboard_fails() {
        let operator = ScriptedOperator::new().press_keys(Vec::new(), CaptureEnd::TimedOut);

        let result = run(&operator);
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.message, "No key presses received");
    }

    #[test]
    fn test_requires_an_operator() {
        let config = TestConfig::default();
        let shell = ScriptedShell::other();
        let ctx = TestContext { config: &config, shell: &shell, operator: &UnattendedOperator };
        assert!(matches!(KeyboardTest.initialize(&ctx), Err(DiagError::Unsupported(_))));
    }
}
