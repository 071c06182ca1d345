use gtm_audit::util::batch_id;

#[test]
fn batch_id_depends_on_url_order() {
    let a = batch_id("cfg", &["https://a.com".into(), "https://b.com".into()]);
    let b = batch_id("cfg", &["https://b.com".into(), "https://a.com".into()]);
    assert_ne!(a, b);
    assert_eq!(a.len(), 64);
    assert_eq!(a, batch_id("cfg", &["https://a.com".into(), "https://b.com".into()]));
}
