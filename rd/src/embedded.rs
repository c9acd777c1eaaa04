//! Embedded fallback content
//!
//! Compiled-in last resorts: the universal reply template, the default
//! signature block, and the alert fragment table. A deployment with no
//! template files on disk still drafts usable replies from these.

/// Reference prefix for compiled-in template content.
pub const EMBEDDED_PREFIX: &str = "embedded:";

/// File reference of the universal fallback template.
pub const GENERIC_TEMPLATE_REF: &str = "embedded:generic";

/// Universal fallback reply. Every section is gated by an auto-mapped
/// `intention_*` flag, so the draft only speaks to what the customer asked.
pub const UNIVERSAL_FALLBACK: &str = r#"Bonjour {{prenom}},

Merci pour votre message.

{{ai_personalization}}

{{#if intention_report_date}}
Concernant le report de votre examen : votre demande a bien été prise en compte. Nous vous proposerons une nouvelle date dans les meilleurs délais.{{#if prochaines_dates}} Les prochaines sessions disponibles sont le {{prochaines_dates}}.{{/if}}
{{/if}}

{{#if intention_resultat}}
Concernant votre résultat : les résultats sont transmis par la CMA sous 48 heures après la session. Nous revenons vers vous dès réception.
{{/if}}

{{#if intention_convocation}}
Concernant votre convocation : elle vous est envoyée par la CMA environ dix jours avant la date d'examen.
{{/if}}

{{#if intention_paiement}}
Concernant votre paiement : vous pouvez régler votre inscription depuis votre espace personnel, rubrique « Paiement ».
{{/if}}

{{#if intention_documents}}
Concernant vos documents : vous pouvez les déposer directement depuis votre espace personnel. Nous les validons sous 24 heures ouvrées.
{{/if}}

{{#if intention_uber}}
Concernant votre partenariat Uber : l'activation de l'offre est suivie par notre équipe dédiée, qui vous tient informé à chaque étape.
{{/if}}

{{#if intention_cpf}}
Concernant votre dossier CPF : pensez à valider votre inscription sur Mon Compte Formation pour que votre session soit confirmée.
{{/if}}

{{#if intention_acces_evalbox}}
Concernant votre accès Evalbox : vos identifiants vous ont été envoyés par e-mail lors de l'inscription. Pensez à vérifier vos courriers indésirables.
{{/if}}

{{#if intention_planning}}
Concernant le planning : les sessions sont mises à jour chaque semaine dans votre espace personnel.
{{/if}}

N'hésitez pas à revenir vers nous si besoin.

{{> signature}}
"#;

/// Default signature block, used when no `signature` block file exists.
pub const DEFAULT_SIGNATURE: &str = "Cordialement,\nL'équipe VTC Formation";

/// Alert fragments by type. `{placeholder}` slots are filled from the
/// alert's params.
pub const ALERT_FRAGMENTS: &[(&str, &str)] = &[
    (
        "paiement_retard",
        "Attention : votre règlement est en attente depuis le {date}. Sans paiement sous {delai} jours, votre place en session ne pourra pas être maintenue.",
    ),
    (
        "documents_manquants",
        "Attention : il manque encore à votre dossier : {documents}. Votre inscription ne pourra pas être validée sans ces pièces.",
    ),
    (
        "compte_bloque",
        "Attention : votre compte Evalbox est actuellement bloqué. Contactez-nous pour procéder au déblocage.",
    ),
    (
        "delai_cma",
        "Information : la CMA traite actuellement les dossiers sous un délai d'environ {delai} semaines.",
    ),
    (
        "examen_annule",
        "Attention : la session d'examen du {date} a été annulée par la CMA. Nous revenons vers vous avec une nouvelle date.",
    ),
];

/// Look up embedded content by name.
pub fn get_embedded(name: &str) -> Option<&'static str> {
    match name {
        "generic" => Some(UNIVERSAL_FALLBACK),
        "signature" => Some(DEFAULT_SIGNATURE),
        _ => None,
    }
}

/// Look up the fragment registered for an alert type.
pub fn alert_fragment(alert_type: &str) -> Option<&'static str> {
    ALERT_FRAGMENTS
        .iter()
        .find(|(name, _)| *name == alert_type)
        .map(|(_, fragment)| *fragment)
}
