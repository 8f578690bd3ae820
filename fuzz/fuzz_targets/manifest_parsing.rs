#![no_main]
use libfuzzer_sys::fuzz_target;
use orion_host::module::validation::ManifestValidator;
use orion_host::module::ModuleManifest;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Malformed manifests must come back as errors, never panics
    let Ok(manifest) = ModuleManifest::from_toml_str(text) else {
        return;
    };

    let validator = ManifestValidator::new();
    if validator.validate(&manifest).is_valid() {
        let descriptor = manifest.to_descriptor();
        assert_eq!(descriptor.id, manifest.id);
        assert_eq!(descriptor.hard_dependencies, manifest.dependencies);
    }
});
