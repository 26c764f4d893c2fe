use ristretto_classfile::{ClassAccessFlags, FieldAccessFlags, FieldType, MethodAccessFlags};

/// Qualified name of the class type behind a field type, if any.
/// Primitives have none; arrays resolve to their element type.
pub fn class_of_field_type(ty: &FieldType) -> Option<String> {
    match ty {
        FieldType::Base(_) => None,
        FieldType::Object(name) => Some(name.replace('/', ".")),
        FieldType::Array(component) => {
            let mut current = component.as_ref();
            while let FieldType::Array(inner) = current {
                current = inner.as_ref();
            }
            class_of_field_type(current)
        }
    }
}

/// Qualified name behind an annotation type descriptor like `Lcom/foo/Bar;`.
pub fn class_of_annotation_descriptor(descriptor: &str) -> Option<String> {
    let inner = descriptor.strip_prefix('L')?.strip_suffix(';')?;
    Some(inner.replace('/', "."))
}

/// Qualified name behind a constant-pool class entry. Entries at `checkcast`
/// and `anewarray` sites may hold array descriptors instead of plain names.
pub fn class_of_pool_name(name: &str) -> Option<String> {
    let mut stripped = name;
    while let Some(rest) = stripped.strip_prefix('[') {
        stripped = rest;
    }
    if stripped.len() == name.len() {
        return Some(name.replace('/', "."));
    }
    class_of_annotation_descriptor(stripped)
}

pub fn class_modifiers(flags: ClassAccessFlags) -> Vec<String> {
    let mut mods = Vec::new();
    if flags.contains(ClassAccessFlags::PUBLIC) {
        mods.push("public".into());
    }
    if flags.contains(ClassAccessFlags::FINAL) {
        mods.push("final".into());
    }
    if flags.contains(ClassAccessFlags::ABSTRACT) && !flags.contains(ClassAccessFlags::INTERFACE) {
        mods.push("abstract".into());
    }
    mods
}

pub fn field_modifiers(flags: FieldAccessFlags) -> Vec<String> {
    let mut mods = Vec::new();
    if flags.contains(FieldAccessFlags::PUBLIC) {
        mods.push("public".into());
    }
    if flags.contains(FieldAccessFlags::PRIVATE) {
        mods.push("private".into());
    }
    if flags.contains(FieldAccessFlags::PROTECTED) {
        mods.push("protected".into());
    }
    if flags.contains(FieldAccessFlags::STATIC) {
        mods.push("static".into());
    }
    if flags.contains(FieldAccessFlags::FINAL) {
        mods.push("final".into());
    }
    if flags.contains(FieldAccessFlags::VOLATILE) {
        mods.push("volatile".into());
    }
    if flags.contains(FieldAccessFlags::TRANSIENT) {
        mods.push("transient".into());
    }
    mods
}

pub fn method_modifiers(flags: MethodAccessFlags) -> Vec<String> {
    let mut mods = Vec::new();
    if flags.contains(MethodAccessFlags::PUBLIC) {
        mods.push("public".into());
    }
    if flags.contains(MethodAccessFlags::PRIVATE) {
        mods.push("private".into());
    }
    if flags.contains(MethodAccessFlags::PROTECTED) {
        mods.push("protected".into());
    }
    if flags.contains(MethodAccessFlags::STATIC) {
        mods.push("static".into());
    }
    if flags.contains(MethodAccessFlags::FINAL) {
        mods.push("final".into());
    }
    if flags.contains(MethodAccessFlags::SYNCHRONIZED) {
        mods.push("synchronized".into());
    }
    if flags.contains(MethodAccessFlags::NATIVE) {
        mods.push("native".into());
    }
    if flags.contains(MethodAccessFlags::ABSTRACT) {
        mods.push("abstract".into());
    }
    mods
}
