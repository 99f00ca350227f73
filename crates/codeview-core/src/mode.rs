//! Tokenizer modes and the mode registry.
//!
//! A [`Mode`] turns a line into styled tokens while threading a state from line to line. Modes
//! with different state types are stored behind [`ModeHandle`], which erases the state type into
//! a [`ModeStateBox`].

use crate::stream::StringStream;
use codeview_lang::{MimeTable, ModeSpec, NULL_MODE};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Style identifier produced by modes (opaque to the engine).
pub type StyleId = u32;

/// Optional capabilities of a mode.
pub struct ModeHooks<S> {
    /// Called instead of `token` for empty lines.
    pub blank_line: Option<fn(&mut S)>,
    /// Smart indentation: `(state, text_after_cursor, indent_unit)` to a column, or `None` when
    /// the mode cannot decide.
    pub indent: Option<fn(&S, &str, usize) -> Option<usize>>,
    /// Characters that trigger re-indentation when typed.
    pub electric_chars: Option<&'static str>,
    /// Overrides the document's `flatten_spans` setting.
    pub flatten_spans: Option<bool>,
}

impl<S> Default for ModeHooks<S> {
    fn default() -> Self {
        Self {
            blank_line: None,
            indent: None,
            electric_chars: None,
            flatten_spans: None,
        }
    }
}

/// A line tokenizer.
pub trait Mode: 'static {
    /// State carried from one line to the next.
    type State: Clone + fmt::Debug + 'static;

    /// Registered name.
    fn name(&self) -> &str;

    /// State at the start of the document.
    fn start_state(&self) -> Self::State;

    /// Read one token from `stream` and return its style.
    ///
    /// Must advance the stream; a call that doesn't is retried a few times (the state may have
    /// changed) before the engine gives up.
    fn token(&self, stream: &mut StringStream<'_>, state: &mut Self::State) -> Option<StyleId>;

    /// Optional capabilities.
    fn hooks(&self) -> ModeHooks<Self::State> {
        ModeHooks::default()
    }
}

/// Type-erased mode state.
pub trait ModeState: fmt::Debug {
    /// Clone into a new box.
    fn box_clone(&self) -> Box<dyn ModeState>;
    /// Upcast for downcasting.
    fn as_any(&self) -> &dyn Any;
    /// Upcast for mutable downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Clone + fmt::Debug + 'static> ModeState for T {
    fn box_clone(&self) -> Box<dyn ModeState> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Owned, cloneable, type-erased mode state.
#[derive(Debug)]
pub struct ModeStateBox(Box<dyn ModeState>);

impl ModeStateBox {
    /// Box a concrete state.
    pub fn new<T: Clone + fmt::Debug + 'static>(state: T) -> Self {
        Self(Box::new(state))
    }

    /// Borrow the concrete state, if it has type `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        (*self.0).as_any().downcast_ref::<T>()
    }

    /// Mutably borrow the concrete state, if it has type `T`.
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        (*self.0).as_any_mut().downcast_mut::<T>()
    }
}

impl Clone for ModeStateBox {
    fn clone(&self) -> Self {
        Self(self.0.box_clone())
    }
}

/// Object-safe view of a [`Mode`].
pub trait ErasedMode {
    /// Registered name.
    fn name(&self) -> &str;
    /// Boxed start state.
    fn start_state(&self) -> ModeStateBox;
    /// Read one token.
    fn token(&self, stream: &mut StringStream<'_>, state: &mut ModeStateBox) -> Option<StyleId>;
    /// Run the blank-line hook, if any.
    fn blank_line(&self, state: &mut ModeStateBox);
    /// `true` if the mode has an indent hook.
    fn has_indent(&self) -> bool;
    /// Run the indent hook.
    fn indent(&self, state: &ModeStateBox, text_after: &str, indent_unit: usize) -> Option<usize>;
    /// Electric characters.
    fn electric_chars(&self) -> Option<&'static str>;
    /// Span flattening override.
    fn flatten_spans(&self) -> Option<bool>;
}

struct Erased<M: Mode> {
    mode: M,
    hooks: ModeHooks<M::State>,
}

fn state_of<'s, S: 'static>(mode: &str, state: &'s mut ModeStateBox) -> &'s mut S {
    match state.downcast_mut::<S>() {
        Some(s) => s,
        None => panic!("mode {mode} was handed a state of another mode"),
    }
}

impl<M: Mode> ErasedMode for Erased<M> {
    fn name(&self) -> &str {
        self.mode.name()
    }

    fn start_state(&self) -> ModeStateBox {
        ModeStateBox::new(self.mode.start_state())
    }

    fn token(&self, stream: &mut StringStream<'_>, state: &mut ModeStateBox) -> Option<StyleId> {
        let state = state_of::<M::State>(self.mode.name(), state);
        self.mode.token(stream, state)
    }

    fn blank_line(&self, state: &mut ModeStateBox) {
        if let Some(hook) = self.hooks.blank_line {
            hook(state_of::<M::State>(self.mode.name(), state));
        }
    }

    fn has_indent(&self) -> bool {
        self.hooks.indent.is_some()
    }

    fn indent(&self, state: &ModeStateBox, text_after: &str, indent_unit: usize) -> Option<usize> {
        let hook = self.hooks.indent?;
        let state = state.downcast_ref::<M::State>()?;
        hook(state, text_after, indent_unit)
    }

    fn electric_chars(&self) -> Option<&'static str> {
        self.hooks.electric_chars
    }

    fn flatten_spans(&self) -> Option<bool> {
        self.hooks.flatten_spans
    }
}

/// Shared handle to a mode.
#[derive(Clone)]
pub struct ModeHandle(Rc<dyn ErasedMode>);

impl ModeHandle {
    /// Wrap a concrete mode.
    pub fn new<M: Mode>(mode: M) -> Self {
        let hooks = mode.hooks();
        Self(Rc::new(Erased { mode, hooks }))
    }

    /// The built-in mode that produces no styles.
    pub fn null() -> Self {
        Self::new(NullMode)
    }

    /// `true` if both handles point at the same mode instance.
    pub fn same(&self, other: &ModeHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::ops::Deref for ModeHandle {
    type Target = dyn ErasedMode;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl fmt::Debug for ModeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModeHandle").field(&self.0.name()).finish()
    }
}

/// Mode that consumes every line as one unstyled token.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMode;

impl Mode for NullMode {
    type State = ();

    fn name(&self) -> &str {
        NULL_MODE
    }

    fn start_state(&self) {}

    fn token(&self, stream: &mut StringStream<'_>, _state: &mut ()) -> Option<StyleId> {
        stream.skip_to_end();
        None
    }
}

type ModeFactory = Rc<dyn Fn(&ModeSpec) -> ModeHandle>;

/// Named mode factories plus the MIME table used to resolve mode requests.
#[derive(Clone)]
pub struct ModeRegistry {
    factories: BTreeMap<String, ModeFactory>,
    mimes: MimeTable,
}

impl Default for ModeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeRegistry {
    /// Registry with the `null` mode and the default MIME table.
    pub fn new() -> Self {
        let mut registry = Self {
            factories: BTreeMap::new(),
            mimes: MimeTable::with_defaults(),
        };
        registry.define_mode(NULL_MODE, |_| ModeHandle::null());
        registry
    }

    /// Register a mode factory under `name`.
    pub fn define_mode(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&ModeSpec) -> ModeHandle + 'static,
    ) {
        self.factories.insert(name.into(), Rc::new(factory));
    }

    /// Map a MIME type to a mode spec.
    pub fn define_mime(&mut self, mime: impl Into<String>, spec: ModeSpec) {
        self.mimes.define(mime, spec);
    }

    /// `true` if a mode of that name is registered.
    pub fn has_mode(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// The MIME table.
    pub fn mimes(&self) -> &MimeTable {
        &self.mimes
    }

    /// Instantiate the mode for a MIME type or mode name; unknown names give the null mode.
    pub fn get_mode(&self, spec: &str) -> ModeHandle {
        self.get_mode_for(&self.mimes.resolve(spec))
    }

    /// Instantiate the mode for a resolved spec.
    pub fn get_mode_for(&self, spec: &ModeSpec) -> ModeHandle {
        match self.factories.get(&spec.name) {
            Some(factory) => factory(spec),
            None => ModeHandle::null(),
        }
    }
}

impl fmt::Debug for ModeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeRegistry")
            .field("modes", &self.factories.keys().collect::<Vec<_>>())
            .field("mimes", &self.mimes.len())
            .finish()
    }
}
