/// Where the engine sends the next chunk of input. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRoute {
    /// Menu command keys
    Menu,
    /// Sysop menu editor
    MenuEditor,
    /// Top of the module stack, before logon
    PreLogon,
    /// Top of the module stack, during logon or signup
    Logon,
    /// Top of the module stack, after logon
    Module,
}
