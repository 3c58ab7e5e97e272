//! Modifier State - Sticky Ctrl/Alt/Meta emulation
//!
//! Touch keyboards have no hardware modifiers, so the toolbar arms them instead.
//! A single tap arms a modifier for the next keystroke, a double tap locks it
//! until it is double tapped again.

/// Modifier keys emulated by the toolbar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Ctrl,
    Alt,
    Meta,
}

impl Modifier {
    pub const ALL: [Modifier; 3] = [Modifier::Ctrl, Modifier::Alt, Modifier::Meta];

    /// Name used by toolbar buttons (`data-mod` style)
    pub fn name(&self) -> &'static str {
        match self {
            Modifier::Ctrl => "ctrl",
            Modifier::Alt => "alt",
            Modifier::Meta => "meta",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => Some(Modifier::Ctrl),
            "alt" | "option" => Some(Modifier::Alt),
            "meta" | "cmd" | "super" => Some(Modifier::Meta),
            _ => None,
        }
    }

    fn index(&self) -> usize {
        match self {
            Modifier::Ctrl => 0,
            Modifier::Alt => 1,
            Modifier::Meta => 2,
        }
    }
}

/// Effective phase of one modifier, used for toolbar highlighting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierPhase {
    /// Not armed
    Idle,
    /// Armed for the next keystroke only
    Armed,
    /// Armed until unlocked
    Locked,
}

/// Sticky state of a single modifier
///
/// `locked` implies `active` only at the moment the lock is turned on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    pub active: bool,
    pub locked: bool,
}

impl ModifierState {
    /// Whether the modifier applies to the next keystroke
    pub fn is_effective(&self) -> bool {
        self.active || self.locked
    }

    pub fn phase(&self) -> ModifierPhase {
        if self.locked {
            ModifierPhase::Locked
        } else if self.active {
            ModifierPhase::Armed
        } else {
            ModifierPhase::Idle
        }
    }
}

/// Effective modifier flags at composition time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectiveModifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl EffectiveModifiers {
    pub const NONE: EffectiveModifiers = EffectiveModifiers {
        ctrl: false,
        alt: false,
        meta: false,
    };

    /// Number of effective meta-class modifiers (Alt, Meta)
    pub fn meta_class_count(&self) -> usize {
        usize::from(self.alt) + usize::from(self.meta)
    }
}

// ========== ModifierSet ==========

/// The sticky modifier state machine
///
/// One instance per client, owned by the input controller and shared by every
/// key source that feeds it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifierSet {
    states: [ModifierState; 3],
}

impl ModifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, modifier: Modifier) -> ModifierState {
        self.states[modifier.index()]
    }

    pub fn phase(&self, modifier: Modifier) -> ModifierPhase {
        self.state(modifier).phase()
    }

    pub fn is_effective(&self, modifier: Modifier) -> bool {
        self.state(modifier).is_effective()
    }

    /// Single tap: Idle -> Armed. No-op when already armed or locked.
    pub fn tap(&mut self, modifier: Modifier) {
        let state = &mut self.states[modifier.index()];
        if !state.locked {
            state.active = true;
        }
    }

    /// Double tap: toggles the lock.
    ///
    /// Locking forces `active`. Unlocking leaves `active` as it was, so a
    /// modifier unlocked this way stays armed for one more keystroke.
    pub fn double_tap(&mut self, modifier: Modifier) {
        let state = &mut self.states[modifier.index()];
        state.locked = !state.locked;
        if state.locked {
            state.active = true;
        }
    }

    /// Post-dispatch reset: disarm every modifier that is not locked
    pub fn after_dispatch(&mut self) {
        for state in self.states.iter_mut().filter(|s| !s.locked) {
            state.active = false;
        }
    }

    pub fn effective(&self) -> EffectiveModifiers {
        EffectiveModifiers {
            ctrl: self.is_effective(Modifier::Ctrl),
            alt: self.is_effective(Modifier::Alt),
            meta: self.is_effective(Modifier::Meta),
        }
    }

    /// Snapshot of all modifiers in toolbar order
    pub fn snapshot(&self) -> Vec<(Modifier, ModifierPhase)> {
        Modifier::ALL.iter().map(|m| (*m, self.phase(*m))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tap_arms_idle_modifier() {
        let mut mods = ModifierSet::new();
        assert_eq!(mods.phase(Modifier::Ctrl), ModifierPhase::Idle);

        mods.tap(Modifier::Ctrl);
        assert_eq!(mods.phase(Modifier::Ctrl), ModifierPhase::Armed);
        assert_eq!(mods.phase(Modifier::Alt), ModifierPhase::Idle);
    }

    #[test]
    fn test_tap_is_idempotent() {
        let mut mods = ModifierSet::new();
        mods.tap(Modifier::Alt);
        let once = mods.clone();
        mods.tap(Modifier::Alt);
        mods.tap(Modifier::Alt);
        assert_eq!(mods, once);
    }

    #[test]
    fn test_double_tap_locks_and_forces_active() {
        let mut mods = ModifierSet::new();
        mods.double_tap(Modifier::Alt);
        let state = mods.state(Modifier::Alt);
        assert!(state.locked);
        assert!(state.active);
        assert_eq!(mods.phase(Modifier::Alt), ModifierPhase::Locked);
    }

    #[test]
    fn test_unlock_keeps_active() {
        let mut mods = ModifierSet::new();
        mods.double_tap(Modifier::Ctrl);
        mods.double_tap(Modifier::Ctrl);

        let state = mods.state(Modifier::Ctrl);
        assert!(!state.locked);
        assert!(state.active);
        assert_eq!(mods.phase(Modifier::Ctrl), ModifierPhase::Armed);
    }

    #[test]
    fn test_tap_on_locked_is_noop() {
        let mut mods = ModifierSet::new();
        mods.double_tap(Modifier::Meta);
        mods.tap(Modifier::Meta);
        assert_eq!(mods.phase(Modifier::Meta), ModifierPhase::Locked);
    }

    #[test]
    fn test_after_dispatch_resets_unlocked_only() {
        let mut mods = ModifierSet::new();
        mods.tap(Modifier::Ctrl);
        mods.double_tap(Modifier::Alt);
        mods.tap(Modifier::Meta);

        mods.after_dispatch();

        assert!(!mods.state(Modifier::Ctrl).active);
        assert!(!mods.state(Modifier::Meta).active);
        assert_eq!(
            mods.state(Modifier::Alt),
            ModifierState {
                active: true,
                locked: true
            }
        );
    }

    #[test]
    fn test_effective_flags() {
        let mut mods = ModifierSet::new();
        assert_eq!(mods.effective(), EffectiveModifiers::NONE);

        mods.tap(Modifier::Ctrl);
        mods.double_tap(Modifier::Meta);
        let eff = mods.effective();
        assert!(eff.ctrl);
        assert!(!eff.alt);
        assert!(eff.meta);
        assert_eq!(eff.meta_class_count(), 1);
    }

    #[test]
    fn test_modifier_names() {
        for m in Modifier::ALL {
            assert_eq!(Modifier::from_name(m.name()), Some(m));
        }
        assert_eq!(Modifier::from_name("Control"), Some(Modifier::Ctrl));
        assert_eq!(Modifier::from_name("shift"), None);
    }
}
