//! Static route policy.
//!
//! Every request is matched against a table of `(pattern, methods) → rule`
//! rows frozen at boot. The most specific matching row wins; a request that
//! matches nothing requires authentication.

mod pattern;

use http::Method;
use thiserror::Error;

pub use self::pattern::{PathPattern, Specificity, is_well_formed};
use crate::models::auth::{Principal, Role};
use crate::ownership::OwnedResource;

/// Errors building a policy table.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid route pattern {0:?}: {1}")]
    InvalidPattern(String, &'static str),

    #[error("ambiguous policy: {0} has overlapping rows for the same methods")]
    Ambiguous(String),

    #[error("owner check on {0} needs a {{param}} segment")]
    OwnerWithoutParam(String),
}

/// Who may reach a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRule {
    Public,
    Authenticated,
    AnyOf(Vec<Role>),
}

/// Outcome of evaluating a request against the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Proceed. `ownership` names the resource whose owner must match.
    Allow { ownership: Option<OwnershipCheck> },
    /// No usable principal on a protected route (401).
    DenyAnonymous,
    /// Principal present but role not permitted (403).
    DenyRole,
    /// The path does not decode cleanly, or an owner-checked route was
    /// addressed with an identifier outside the parameter grammar (400).
    MalformedPath,
}

/// A resource ownership check still to be performed for an allowed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipCheck {
    pub resource: OwnedResource,
    pub resource_id: String,
}

/// One row of the route table.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    pattern: PathPattern,
    methods: Option<Vec<Method>>,
    rule: AccessRule,
    owner: Option<OwnedResource>,
    consumes_credentials: bool,
}

impl RoutePolicy {
    pub fn new(pattern: &str, rule: AccessRule) -> Result<Self, PolicyError> {
        Ok(Self {
            pattern: PathPattern::parse(pattern)?,
            methods: None,
            rule,
            owner: None,
            consumes_credentials: false,
        })
    }

    /// Restrict the row to the given methods.
    pub fn methods(mut self, methods: &[Method]) -> Self {
        self.methods = Some(methods.to_vec());
        self
    }

    /// Require the principal to own the resource named by the first
    /// `{param}` of the pattern.
    pub fn owned_by(mut self, resource: OwnedResource) -> Self {
        self.owner = Some(resource);
        self
    }

    /// The handler reads the bearer itself; authentication must not
    /// interpret it.
    pub fn consuming_credentials(mut self) -> Self {
        self.consumes_credentials = true;
        self
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn rule(&self) -> &AccessRule {
        &self.rule
    }

    pub fn owner(&self) -> Option<OwnedResource> {
        self.owner
    }

    pub fn consumes_credentials(&self) -> bool {
        self.consumes_credentials
    }

    fn applies_to(&self, method: &Method) -> bool {
        self.methods.as_ref().is_none_or(|m| m.contains(method))
    }

    fn overlaps(&self, other: &RoutePolicy) -> bool {
        match (&self.methods, &other.methods) {
            (None, _) | (_, None) => true,
            (Some(a), Some(b)) => a.iter().any(|m| b.contains(m)),
        }
    }

    /// Table ranking: pattern specificity, then method-specific rows.
    fn rank(&self) -> (Specificity, bool) {
        (self.pattern.specificity(), self.methods.is_some())
    }
}

/// The frozen route table.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    rows: Vec<RoutePolicy>,
}

impl PolicyTable {
    /// Build a table, rejecting duplicate patterns with overlapping methods
    /// and owner checks on patterns without a parameter.
    pub fn new(rows: Vec<RoutePolicy>) -> Result<Self, PolicyError> {
        for (i, row) in rows.iter().enumerate() {
            if row.owner.is_some() && !row.pattern.as_str().contains('{') {
                return Err(PolicyError::OwnerWithoutParam(row.pattern.to_string()));
            }
            let clash = rows[i + 1..]
                .iter()
                .any(|other| other.pattern == row.pattern && other.overlaps(row));
            if clash {
                return Err(PolicyError::Ambiguous(row.pattern.to_string()));
            }
        }
        Ok(Self { rows })
    }

    /// The marketplace route table.
    pub fn marketplace() -> Result<Self, PolicyError> {
        use AccessRule::{AnyOf, Authenticated, Public};

        let get = [Method::GET];
        let public = [
            "/",
            "/health",
            "/api/health/**",
            "/api/auth/login",
            "/api/auth/register",
            "/api/auth/refresh",
            "/swagger-ui.html",
            "/swagger-ui/**",
            "/api-docs/**",
            "/v3/api-docs/**",
        ];

        let mut rows = public
            .iter()
            .map(|p| RoutePolicy::new(p, Public))
            .collect::<Result<Vec<_>, _>>()?;

        rows.extend([
            RoutePolicy::new("/api/auth/logout", Public)?.consuming_credentials(),
            RoutePolicy::new("/api/auth/verify", Authenticated)?,
            RoutePolicy::new("/api/debug/**", Authenticated)?,
            RoutePolicy::new("/uploads/**", Public)?.methods(&get),
            RoutePolicy::new("/api/artworks", Public)?.methods(&get),
            RoutePolicy::new("/api/artworks", AnyOf(vec![Role::Artist, Role::Admin]))?
                .methods(&[Method::POST]),
            RoutePolicy::new("/api/artworks/{id}", Public)?.methods(&get),
            RoutePolicy::new("/api/artworks/{id}", AnyOf(vec![Role::Artist, Role::Admin]))?
                .methods(&[Method::PUT, Method::PATCH, Method::DELETE])
                .owned_by(OwnedResource::Artwork),
            RoutePolicy::new("/api/artworks/my-artworks", AnyOf(vec![Role::Artist]))?
                .methods(&get),
            RoutePolicy::new("/api/artists/**", Public)?.methods(&get),
            RoutePolicy::new("/api/v1/artwork-query/**", Public)?.methods(&get),
            RoutePolicy::new("/api/cart/**", AnyOf(vec![Role::Customer]))?,
            RoutePolicy::new("/api/wishlist/**", AnyOf(vec![Role::Customer]))?,
            RoutePolicy::new("/api/orders/**", AnyOf(vec![Role::Customer, Role::Artist]))?,
            RoutePolicy::new("/api/orders/{id}", AnyOf(vec![Role::Customer, Role::Artist]))?
                .owned_by(OwnedResource::Order),
            RoutePolicy::new("/api/users/**", Authenticated)?,
            RoutePolicy::new("/api/users/profile", Authenticated)?,
            RoutePolicy::new("/api/users/password", Authenticated)?,
            RoutePolicy::new("/api/users/{id}", Authenticated)?
                .methods(&[Method::PUT, Method::PATCH, Method::DELETE])
                .owned_by(OwnedResource::UserAccount),
            RoutePolicy::new("/api/dashboard/artist/**", AnyOf(vec![Role::Artist]))?,
            RoutePolicy::new("/api/dashboard/admin/**", AnyOf(vec![Role::Admin]))?,
            RoutePolicy::new("/api/dashboard/customer/**", AnyOf(vec![Role::Customer]))?,
            RoutePolicy::new("/api/admin/**", AnyOf(vec![Role::Admin]))?,
        ]);

        Self::new(rows)
    }

    /// The most specific row matching the request, if any.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<&RoutePolicy> {
        let mut best: Option<&RoutePolicy> = None;
        for row in &self.rows {
            if !row.applies_to(method) || !row.pattern.matches(path) {
                continue;
            }
            // first row wins exact ties
            if best.is_none_or(|b| row.rank() > b.rank()) {
                best = Some(row);
            }
        }
        best
    }

    /// An owner-checked row the router would dispatch to, but whose
    /// parameter grammar rejects the identifier.
    fn evades_owner_check(&self, method: &Method, path: &str) -> bool {
        self.rows.iter().any(|row| {
            row.owner.is_some()
                && row.applies_to(method)
                && row.pattern.matches_shape(path)
                && !row.pattern.matches(path)
        })
    }

    /// Decide whether `principal` may call `method path`.
    ///
    /// `path` is the raw request path; segments are compared
    /// percent-decoded. Inactive principals are treated as anonymous.
    /// Ownership is not decided here; an allowed request on an owner-checked
    /// row carries the [`OwnershipCheck`] for the caller to complete.
    pub fn evaluate(
        &self,
        method: &Method,
        path: &str,
        principal: Option<&Principal>,
    ) -> PolicyDecision {
        if !is_well_formed(path) || self.evades_owner_check(method, path) {
            return PolicyDecision::MalformedPath;
        }

        let principal = principal.filter(|p| p.active);
        let Some(row) = self.resolve(method, path) else {
            return match principal {
                Some(_) => PolicyDecision::Allow { ownership: None },
                None => PolicyDecision::DenyAnonymous,
            };
        };

        match (&row.rule, principal) {
            (AccessRule::Public, _) => return PolicyDecision::Allow { ownership: None },
            (_, None) => return PolicyDecision::DenyAnonymous,
            (AccessRule::AnyOf(roles), Some(p)) if !p.has_any_role(roles) => {
                return PolicyDecision::DenyRole;
            }
            _ => {}
        }

        let ownership = row.owner.and_then(|resource| {
            let params = row.pattern.captures(path)?;
            Some(OwnershipCheck {
                resource,
                resource_id: params.first()?.to_string(),
            })
        });
        PolicyDecision::Allow { ownership }
    }
}
